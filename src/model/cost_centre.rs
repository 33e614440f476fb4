use serde::{Deserialize, Serialize};

/// An organizational budget bucket ("Kostenstelle").
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CostCentre {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) active: bool,
}

impl CostCentre {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            active: true,
        }
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn active(&self) -> bool {
        self.active
    }

    /// The accounting service marks active cost centres with status 100.
    pub(crate) fn active_from_code(code: i64) -> bool {
        code == 100
    }

    pub(crate) fn status_code(&self) -> i64 {
        if self.active {
            100
        } else {
            0
        }
    }
}
