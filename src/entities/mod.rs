pub mod message;
pub mod pledge;
pub mod project;
pub mod project_update;
pub mod reward;
pub mod transaction;
pub mod user;

pub use project::ProjectStatus;
pub use transaction::TransactionStatus;
pub use user::UserRole;

pub use message::Entity as Message;
pub use pledge::Entity as Pledge;
pub use project::Entity as Project;
pub use project_update::Entity as ProjectUpdate;
pub use reward::Entity as Reward;
pub use transaction::Entity as Transaction;
pub use user::Entity as User;
