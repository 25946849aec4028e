use uuid::Uuid;

pub type Id = String;

/// Prefix carried by every locally generated identity that the server has
/// not acknowledged yet.
pub const TEMP_ID_PREFIX: &str = "temp-";

pub fn generate_id() -> Id {
    Uuid::new_v4().to_string()
}

/// Generate a temporary identity for an optimistically created entity.
pub fn generate_temp_id() -> Id {
    format!("{}{}", TEMP_ID_PREFIX, Uuid::new_v4())
}

pub fn is_temp_id(id: &str) -> bool {
    id.starts_with(TEMP_ID_PREFIX)
}
