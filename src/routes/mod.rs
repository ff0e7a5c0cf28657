pub mod dashboard;
pub mod messages;
pub mod pledges;
pub mod projects;
pub mod rewards;
pub mod users;

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", post(users::register_user))
        .route("/users/me", get(users::current_user))
        .route("/users/{id}", get(users::get_user).delete(users::delete_user))
        .route(
            "/projects",
            get(projects::list_projects).post(projects::create_project),
        )
        .route("/projects/categories", get(projects::list_categories))
        .route(
            "/projects/{id}",
            get(projects::get_project)
                .put(projects::update_project)
                .delete(projects::delete_project),
        )
        .route("/projects/{id}/status", put(projects::change_status))
        .route(
            "/projects/{id}/rewards",
            get(rewards::list_rewards).post(rewards::create_reward),
        )
        .route(
            "/rewards/{id}",
            get(rewards::get_reward)
                .put(rewards::update_reward)
                .delete(rewards::delete_reward),
        )
        .route("/projects/{id}/pledge", get(pledges::pledge_form))
        .route("/projects/{id}/updates", post(dashboard::post_update))
        .route("/pledges/stage", post(pledges::stage_pledge))
        .route("/pledges/payment-intent", post(pledges::create_payment_intent))
        .route("/pledges/confirm", post(pledges::confirm_pledge))
        .route("/messages", post(messages::send_message))
        .route("/messages/inbox", get(messages::inbox))
        .route("/messages/outbox", get(messages::outbox))
        .route("/messages/recipients", get(messages::recipients))
        .route("/messages/{id}", get(messages::read_message))
        .route("/dashboard/backer", get(dashboard::backer))
        .route("/dashboard/creator", get(dashboard::creator))
}
