use serde::{Deserialize, Serialize};

/// A person or organization record in the accounting service.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Contact {
    pub(crate) id: String,
    pub(crate) name: String,
    /// The contact category id, e.g. `3` for suppliers.
    pub(crate) category_id: Option<String>,
    pub(crate) customer_number: Option<String>,
    pub(crate) supplier_number: Option<String>,
}

impl Contact {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_category(mut self, category_id: impl Into<String>) -> Self {
        self.category_id = Some(category_id.into());
        self
    }

    pub fn with_numbers(
        mut self,
        customer_number: Option<String>,
        supplier_number: Option<String>,
    ) -> Self {
        self.customer_number = customer_number;
        self.supplier_number = supplier_number;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category_id(&self) -> Option<&str> {
        self.category_id.as_deref()
    }

    pub fn customer_number(&self) -> Option<&str> {
        self.customer_number.as_deref()
    }

    pub fn supplier_number(&self) -> Option<&str> {
        self.supplier_number.as_deref()
    }
}

/// Organizations carry a `name`, people only have given and family names. Returns the display name
/// used for matching, which is empty when none of the parts are present.
pub fn display_name(name: Option<&str>, given: Option<&str>, family: Option<&str>) -> String {
    if let Some(name) = name.map(str::trim).filter(|s| !s.is_empty()) {
        return name.to_string();
    }
    [given, family]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_prefers_name() {
        assert_eq!(
            display_name(Some("Kontaktmission e.V."), Some("Hans"), Some("Meier")),
            "Kontaktmission e.V."
        );
    }

    #[test]
    fn test_display_name_synthesized() {
        assert_eq!(display_name(None, Some("Hans"), Some("Meier")), "Hans Meier");
        assert_eq!(display_name(Some("  "), None, Some("Meier")), "Meier");
        assert_eq!(display_name(None, None, None), "");
    }
}
