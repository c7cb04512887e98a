//! Connect-script generation for remote entities.

use crate::entity::EntityRecord;
use crate::error::{OutpostError, Result};

/// Build a bash script that opens an ssh session to the entity's live
/// coordinates. The entity must carry a user and a url; the port is added
/// only when set.
pub fn ssh_script(entity: &EntityRecord) -> Result<String> {
    if entity.user.is_empty() {
        return Err(OutpostError::Validation {
            field: "user".to_string(),
            message: format!("no user for entity: {}", entity.id),
        });
    }
    if entity.url.is_empty() {
        return Err(OutpostError::Validation {
            field: "url".to_string(),
            message: format!("no url for entity: {}", entity.id),
        });
    }

    let display = if entity.label.is_empty() {
        &entity.id
    } else {
        &entity.label
    };
    let mut script = String::new();
    script.push_str("#!/usr/bin/env bash\n");
    script.push_str(&format!("echo \"Connecting to: {}\"\n", display));
    script.push_str(&format!("ssh {}@{}", entity.user, entity.url));
    if entity.port != 0 {
        script.push_str(&format!(" -p {}", entity.port));
    }
    script.push_str(" -oStrictHostKeyChecking=no $@\n");
    Ok(script)
}
