use crate::commands::Out;
use crate::vouchers::VoucherType;
use crate::{Config, Result};
use serde::Serialize;

/// A voucher type, the accounting type it books to and its configured resolver settings.
#[derive(Debug, Clone, Serialize)]
pub struct TypeInfo {
    pub voucher_type: VoucherType,
    /// The substring that selects the accounting type by name.
    pub accounting_type: String,
    pub uses_rules: bool,
    pub contact_overrides: usize,
    pub cost_centre_overrides: usize,
    pub preferred_category: Option<String>,
}

/// Lists the supported voucher types.
pub async fn types(config: Config) -> Result<Out<Vec<TypeInfo>>> {
    let infos: Vec<TypeInfo> = VoucherType::ALL
        .iter()
        .map(|vt| {
            let settings = config.voucher_settings(*vt);
            TypeInfo {
                voucher_type: *vt,
                accounting_type: vt.accounting_type_name().to_string(),
                uses_rules: vt.uses_rules(),
                contact_overrides: settings.contact_overrides.len(),
                cost_centre_overrides: settings.cost_centre_overrides.len(),
                preferred_category: settings.preferred_category,
            }
        })
        .collect();
    let lines: Vec<String> = infos
        .iter()
        .map(|i| format!("  {:<16} {}", i.voucher_type.to_string(), i.accounting_type))
        .collect();
    Ok(Out::new(
        format!("Voucher types:\n{}", lines.join("\n")),
        infos,
    ))
}
