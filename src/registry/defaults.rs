use axum::http::Method;

use super::{ModelOptions, ModelRegistry, RegistryError};
use crate::handlers::protected::tasks::toggle_task;
use crate::models::{Contact, Deal, Note, Settings, Task, User};

/// The CRM's own models and their custom endpoints
pub fn register_default_models(registry: &ModelRegistry) -> Result<(), RegistryError> {
    registry.register::<User>(
        ModelOptions::new()
            .preload(&["settings"])
            .filters(&["email", "role", "username"])
            .admin_only(),
    )?;
    registry.register::<Settings>(ModelOptions::new().filters(&["user_id", "theme", "language"]))?;
    registry.register::<Contact>(
        ModelOptions::new()
            .preload(&["user"])
            .filters(&["contact_stage", "company", "user_id"]),
    )?;
    registry.register::<Deal>(
        ModelOptions::new()
            .preload(&["contact", "user"])
            .filters(&["status", "contact_id", "user_id"]),
    )?;
    registry.register::<Task>(
        ModelOptions::new()
            .preload(&["user", "deal"])
            .filters(&["completed", "deal_id", "user_id"]),
    )?;
    registry.register::<Note>(
        ModelOptions::new()
            .preload(&["user"])
            .filters(&["contact_id", "deal_id", "user_id"]),
    )?;

    registry.register_custom_endpoint(
        "task",
        "/:id/toggle",
        Method::PATCH,
        "Flip the completed flag of a task",
        toggle_task,
    )?;
    Ok(())
}
