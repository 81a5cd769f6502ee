/// Separator between trigger name and relation id in plan-cache identity keys
pub const PLAN_IDENT_SEPARATOR: char = '$';

/// SQL expression stamped into the destination timestamp column
pub const TOUCH_TIMESTAMP_EXPR: &str = "NOW()";

/// Destination key column assumed by the simplified trigger variant
pub const IMPLICIT_KEY_COLUMN: &str = "id";

/// Enable verbose cascade decision logging (for debugging)
pub const TRACE_CASCADES: bool = false;
