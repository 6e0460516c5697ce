use serde::{Deserialize, Serialize};

use crate::ExperimentId;

/// Workspace object whose access control list can be looked up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionTarget {
    /// Registered model by its workspace object id.
    RegisteredModel(String),
    Experiment(ExperimentId),
}

impl PermissionTarget {
    pub fn object_path(&self) -> String {
        match self {
            PermissionTarget::RegisteredModel(id) => format!("registered-models/{}", id),
            PermissionTarget::Experiment(id) => format!("experiments/{}", id),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_type: Option<String>,
    #[serde(default)]
    pub access_control_list: Vec<AccessControl>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessControl {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_principal_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default)]
    pub all_permissions: Vec<Permission>,
}

impl AccessControl {
    /// Name of the user, group or service principal this entry is for.
    pub fn principal(&self) -> &str {
        self.user_name
            .as_deref()
            .or(self.group_name.as_deref())
            .or(self.service_principal_name.as_deref())
            .or(self.display_name.as_deref())
            .unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub permission_level: String,
    #[serde(default)]
    pub inherited: bool,
    #[serde(default)]
    pub inherited_from_object: Vec<String>,
}
