//! Host node naming rules.

pub const DEFAULT_STACK_NAME: &str = "ARKit52_BS";
pub const DEFAULT_GROUP_NAME: &str = "ARKit_Poses_GRP";
pub const DEFAULT_CONTROLLER_NAME: &str = "ARKit52_CTRL";

/// Make `desired` a valid node name: anything other than ASCII alphanumerics
/// and `_` becomes `_`, a leading digit gets a `BS_` prefix, and an empty
/// result falls back to [`DEFAULT_STACK_NAME`].
pub fn sanitize_node_name(desired: &str) -> String {
    let name: String = desired
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                ch
            } else {
                '_'
            }
        })
        .collect();
    if name.is_empty() {
        return DEFAULT_STACK_NAME.to_string();
    }
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        return format!("BS_{name}");
    }
    name
}

/// Morph stack name used for `mesh` in a multi-mesh capture.
pub fn stack_name_for(base: &str, mesh: &str) -> String {
    sanitize_node_name(&format!("{base}_{mesh}"))
}

/// Layout group name used for `mesh` in a multi-mesh capture.
pub fn group_name_for(base: &str, mesh: &str) -> String {
    sanitize_node_name(&format!("{base}_{mesh}"))
}
