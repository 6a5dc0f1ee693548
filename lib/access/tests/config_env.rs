//! Loading the role mapping from the process environment.
//!
//! Kept in its own test binary: it is the only test here that touches
//! environment variables.

use tollgate_access::{AccessConfig, RoleCategory};

#[test]
fn role_mapping_loads_from_environment() {
    // SAFETY: no other test in this binary reads or writes the environment.
    unsafe {
        std::env::set_var("TOLLGATE_ROLES__SUPER_ROLES", "administrators,root");
        std::env::set_var("TOLLGATE_ROLES__READONLY_ROLES", "auditors");
    }

    let config = AccessConfig::from_env().expect("load from environment");

    assert_eq!(config.roles.category_of("administrators"), RoleCategory::Super);
    assert_eq!(config.roles.category_of("root"), RoleCategory::Super);
    assert_eq!(config.roles.category_of("auditors"), RoleCategory::ReadOnly);
    assert_eq!(config.roles.category_of("clerks"), RoleCategory::Standard);
}
