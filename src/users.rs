use chrono::{DateTime, Utc};
use sea_orm::sea_query::Condition;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, Set,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entities::{message, pledge, project, user, Message, Pledge, Project, User, UserRole};
use crate::error::AppError;

const USER_NAME_MAX_LEN: usize = 50;
const BIO_MAX_LEN: usize = 500;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RegisterUser {
    pub user_name: String,
    pub email: String,
    /// `Creator` or `Backer`; admins are not self-registered.
    pub role: UserRole,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub profile_picture_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserSummary {
    pub id: Uuid,
    pub user_name: String,
}

impl From<user::Model> for UserSummary {
    fn from(user: user::Model) -> Self {
        Self {
            id: user.id,
            user_name: user.user_name,
        }
    }
}

/// What other users may see of an account.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PublicProfile {
    pub id: Uuid,
    pub user_name: String,
    pub role: UserRole,
    pub bio: Option<String>,
    pub profile_picture_url: Option<String>,
    pub date_joined: DateTime<Utc>,
}

impl From<user::Model> for PublicProfile {
    fn from(user: user::Model) -> Self {
        Self {
            id: user.id,
            user_name: user.user_name,
            role: user.role,
            bio: user.bio,
            profile_picture_url: user.profile_picture_url,
            date_joined: user.date_joined,
        }
    }
}

pub fn require_role(caller: &user::Model, allowed: &[UserRole]) -> Result<(), AppError> {
    if allowed.contains(&caller.role) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "this action is not available to the {:?} role",
            caller.role
        )))
    }
}

fn validate_identity(user_name: &str, email: &str) -> Result<(), AppError> {
    let name = user_name.trim();
    if name.is_empty() || name.chars().count() > USER_NAME_MAX_LEN {
        return Err(AppError::InvalidRequest(format!(
            "user_name must be between 1 and {} characters",
            USER_NAME_MAX_LEN
        )));
    }
    match email.trim().split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(AppError::InvalidRequest("email is not valid".to_string())),
    }
}

fn validate(input: &RegisterUser) -> Result<(), AppError> {
    validate_identity(&input.user_name, &input.email)?;
    if input
        .bio
        .as_deref()
        .is_some_and(|bio| bio.chars().count() > BIO_MAX_LEN)
    {
        return Err(AppError::InvalidRequest(format!(
            "bio cannot exceed {} characters",
            BIO_MAX_LEN
        )));
    }
    if input.role == UserRole::Admin {
        return Err(AppError::InvalidRequest(
            "role must be Creator or Backer".to_string(),
        ));
    }
    Ok(())
}

#[tracing::instrument(skip(db, input), fields(user_name = %input.user_name))]
pub async fn register(db: &DatabaseConnection, input: RegisterUser) -> Result<user::Model, AppError> {
    validate(&input)?;
    let user_name = input.user_name.trim().to_string();
    let email = input.email.trim().to_ascii_lowercase();

    let taken = User::find()
        .filter(
            Condition::any()
                .add(user::Column::UserName.eq(user_name.as_str()))
                .add(user::Column::Email.eq(email.as_str())),
        )
        .count(db)
        .await?;
    if taken > 0 {
        return Err(AppError::Conflict(
            "user name or email is already registered".to_string(),
        ));
    }

    let created = user::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_name: Set(user_name),
        email: Set(email),
        role: Set(input.role),
        profile_picture_url: Set(input.profile_picture_url.filter(|u| !u.trim().is_empty())),
        bio: Set(input.bio.filter(|b| !b.trim().is_empty())),
        date_joined: Set(Utc::now()),
        is_active: Set(true),
    }
    .insert(db)
    .await?;

    tracing::info!(user_id = %created.id, role = ?created.role, "User registered");
    Ok(created)
}

/// Makes sure the configured operator account exists and is an active Admin.
/// An existing account with the same email is promoted; running it again
/// changes nothing.
#[tracing::instrument(skip(db))]
pub async fn ensure_admin(
    db: &DatabaseConnection,
    user_name: &str,
    email: &str,
) -> Result<user::Model, AppError> {
    validate_identity(user_name, email)?;
    let user_name = user_name.trim();
    let email = email.trim().to_ascii_lowercase();

    if let Some(existing) = User::find()
        .filter(user::Column::Email.eq(email.as_str()))
        .one(db)
        .await?
    {
        if existing.role == UserRole::Admin && existing.is_active {
            return Ok(existing);
        }
        let mut active: user::ActiveModel = existing.into();
        active.role = Set(UserRole::Admin);
        active.is_active = Set(true);
        let promoted = active.update(db).await?;
        tracing::info!(user_id = %promoted.id, "Existing account promoted to Admin");
        return Ok(promoted);
    }

    let name_taken = User::find()
        .filter(user::Column::UserName.eq(user_name))
        .count(db)
        .await?;
    if name_taken > 0 {
        return Err(AppError::Conflict(format!(
            "user name '{}' belongs to another account",
            user_name
        )));
    }

    let created = user::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_name: Set(user_name.to_string()),
        email: Set(email),
        role: Set(UserRole::Admin),
        profile_picture_url: Set(None),
        bio: Set(None),
        date_joined: Set(Utc::now()),
        is_active: Set(true),
    }
    .insert(db)
    .await?;

    tracing::info!(user_id = %created.id, "Admin account created");
    Ok(created)
}

pub async fn get_user(db: &DatabaseConnection, user_id: Uuid) -> Result<user::Model, AppError> {
    User::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("user not found".to_string()))
}

/// Deletes an account that owns nothing. Users may delete themselves; admins
/// may delete anyone.
#[tracing::instrument(skip(db, caller), fields(caller = %caller.id))]
pub async fn delete_user(
    db: &DatabaseConnection,
    caller: &user::Model,
    user_id: Uuid,
) -> Result<(), AppError> {
    if caller.id != user_id && caller.role != UserRole::Admin {
        return Err(AppError::Forbidden(
            "users can only delete their own account".to_string(),
        ));
    }
    let target = get_user(db, user_id).await?;

    let projects = Project::find()
        .filter(project::Column::CreatorId.eq(user_id))
        .count(db)
        .await?;
    let pledges = Pledge::find()
        .filter(pledge::Column::BackerId.eq(user_id))
        .count(db)
        .await?;
    let messages = Message::find()
        .filter(
            Condition::any()
                .add(message::Column::SenderId.eq(user_id))
                .add(message::Column::ReceiverId.eq(user_id)),
        )
        .count(db)
        .await?;
    if projects + pledges + messages > 0 {
        return Err(AppError::Conflict(format!(
            "user still has {} projects, {} pledges and {} messages",
            projects, pledges, messages
        )));
    }

    target.delete(db).await?;
    tracing::info!(user_id = %user_id, "User deleted");
    Ok(())
}
