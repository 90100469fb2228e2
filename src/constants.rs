//! Kernel-wide constants and default values
//!
//! Centralized location for hard-coded names and paths

/// File extension of node-script modules
pub const MODULE_EXTENSION: &str = "node";

/// Default locations, relative to the user's home directory
pub mod dirs {
    /// Root of all per-user kernel state
    pub const HOME_SUBDIR: &str = ".nodle";

    /// Searched for node modules after any configured paths
    pub const MODULES_SUBDIR: &str = "nodes";

    /// Where user factories write their generated modules
    pub const USER_NODES_SUBDIR: &str = "user_nodes";
}

/// Boilerplate for modules generated by user factories
pub mod user_template {
    pub const INPUT_NAME: &str = "X";
    pub const OUTPUT_NAME: &str = "Y";

    /// Module text for a fresh identity class called `class_name`
    pub fn module_text(class_name: &str) -> String {
        format!(
            "# User defined node\n\
             node {name} {{\n\
             \x20   input {input}\n\
             \x20   output {output}\n\
             \n\
             \x20   compute {{\n\
             \x20       return inputs\n\
             \x20   }}\n\
             }}\n",
            name = class_name,
            input = INPUT_NAME,
            output = OUTPUT_NAME,
        )
    }
}
