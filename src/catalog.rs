//! Canonical field catalog.
//!
//! The catalog maps each semantic field (for example `customer_name`) to an
//! ordered list of aliases per [`AnalysisType`]. Alias order is resolution
//! priority: the first alias is always the canonical field name itself, the
//! remaining ones are the spellings tenants commonly use in spreadsheet
//! headers (English and Arabic).
//!
//! A built-in catalog ships with the crate; [`Catalog::load`] reads an
//! override from YAML. Both paths go through [`Catalog::from_specs`], which
//! rejects empty alias lists and duplicate field names.

use std::{fmt, fs::File, io::BufReader, path::Path, str::FromStr};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

pub mod fields {
    pub const CUSTOMER_ID: &str = "customer_id";
    pub const CUSTOMER_NAME: &str = "customer_name";
    pub const PHONE: &str = "phone";
    pub const EMAIL: &str = "email";
    pub const CITY: &str = "city";
    pub const TOTAL_AMOUNT: &str = "total_amount";
    pub const ORDER_ID: &str = "order_id";
    pub const ORDER_DATE: &str = "order_date";
    pub const STATUS: &str = "status";
    pub const PRODUCT_ID: &str = "product_id";
    pub const PRODUCT_NAME: &str = "product_name";
    pub const WEIGHT: &str = "weight";
    pub const CATEGORY: &str = "category";
    pub const PRICE: &str = "price";
    pub const QUANTITY: &str = "quantity";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisType {
    Customer,
    Order,
    Product,
}

impl AnalysisType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisType::Customer => "customer",
            AnalysisType::Order => "order",
            AnalysisType::Product => "product",
        }
    }

    pub fn variants() -> &'static [AnalysisType] {
        &[
            AnalysisType::Customer,
            AnalysisType::Order,
            AnalysisType::Product,
        ]
    }
}

impl fmt::Display for AnalysisType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalysisType {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "customer" | "customers" => Ok(AnalysisType::Customer),
            "order" | "orders" => Ok(AnalysisType::Order),
            "product" | "products" => Ok(AnalysisType::Product),
            other => Err(anyhow!(
                "Unknown analysis type '{other}'. Supported types: customer, order, product"
            )),
        }
    }
}

/// Expected shape of the values behind a canonical field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    #[default]
    Text,
    Identifier,
    Email,
    Phone,
    Date,
    Amount,
    Quantity,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Identifier => "identifier",
            FieldKind::Email => "email",
            FieldKind::Phone => "phone",
            FieldKind::Date => "date",
            FieldKind::Amount => "amount",
            FieldKind::Quantity => "quantity",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalFieldSpec {
    pub field_name: String,
    pub aliases: Vec<String>,
    pub analysis_type: AnalysisType,
    #[serde(default)]
    pub kind: FieldKind,
}

impl CanonicalFieldSpec {
    pub fn new(
        field_name: &str,
        analysis_type: AnalysisType,
        kind: FieldKind,
        aliases: &[&str],
    ) -> Self {
        Self {
            field_name: field_name.to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
            analysis_type,
            kind,
        }
    }

    fn ensure_valid(&self) -> EngineResult<()> {
        if self.aliases.iter().all(|alias| alias.trim().is_empty()) {
            return Err(EngineError::EmptyAliases {
                field: self.field_name.clone(),
                analysis: self.analysis_type,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CatalogFile {
    fields: Vec<CanonicalFieldSpec>,
}

#[derive(Debug, Clone)]
pub struct Catalog {
    specs: Vec<CanonicalFieldSpec>,
}

type BuiltinEntry = (
    AnalysisType,
    &'static str,
    FieldKind,
    &'static [&'static str],
);

const BUILTIN: &[BuiltinEntry] = {
    use AnalysisType::*;
    use FieldKind::*;
    &[
        (Customer, fields::CUSTOMER_ID, Identifier, &["customer_id", "customer id", "client_id", "customer_no"]),
        (Customer, fields::CUSTOMER_NAME, Text, &["customer_name", "name", "full_name", "client_name", "اسم"]),
        (Customer, fields::PHONE, Phone, &["phone", "mobile", "whatsapp", "هاتف", "جوال"]),
        (Customer, fields::EMAIL, Email, &["email", "e-mail", "mail", "بريد"]),
        (Customer, fields::CITY, Text, &["city", "town", "مدينة"]),
        (Customer, fields::TOTAL_AMOUNT, Amount, &["total_amount", "total", "amount", "spent", "المبلغ", "إجمالي"]),
        (Customer, fields::ORDER_DATE, Date, &["order_date", "date", "created", "تاريخ"]),
        (Order, fields::ORDER_ID, Identifier, &["order_id", "order_number", "order no", "invoice", "رقم الطلب"]),
        (Order, fields::CUSTOMER_NAME, Text, &["customer_name", "name", "client_name", "اسم"]),
        (Order, fields::PHONE, Phone, &["phone", "mobile", "whatsapp", "هاتف", "جوال"]),
        (Order, fields::EMAIL, Email, &["email", "e-mail", "mail", "بريد"]),
        (Order, fields::ORDER_DATE, Date, &["order_date", "date", "created", "تاريخ"]),
        (Order, fields::TOTAL_AMOUNT, Amount, &["total_amount", "total", "amount", "المبلغ", "إجمالي"]),
        (Order, fields::PRICE, Amount, &["price", "unit_price", "سعر"]),
        (Order, fields::QUANTITY, Quantity, &["quantity", "qty", "الكمية"]),
        (Order, fields::STATUS, Text, &["status", "state", "الحالة"]),
        (Order, fields::PRODUCT_NAME, Text, &["product_name", "product name", "item_name", "المنتج"]),
        (Product, fields::PRODUCT_ID, Identifier, &["product_id", "sku", "item_id", "barcode"]),
        (Product, fields::PRODUCT_NAME, Text, &["product_name", "product name", "item_name", "name", "المنتج"]),
        (Product, fields::WEIGHT, Text, &["weight", "size", "variant", "الوزن"]),
        (Product, fields::CATEGORY, Text, &["category", "group", "الفئة"]),
        (Product, fields::PRICE, Amount, &["price", "unit_price", "سعر"]),
        (Product, fields::QUANTITY, Quantity, &["quantity", "qty", "units", "sold", "الكمية"]),
        (Product, fields::TOTAL_AMOUNT, Amount, &["total_amount", "total", "revenue", "sales", "المبلغ"]),
    ]
};

impl Catalog {
    pub fn builtin() -> Self {
        let specs = BUILTIN
            .iter()
            .map(|(analysis, field, kind, aliases)| {
                CanonicalFieldSpec::new(field, *analysis, *kind, aliases)
            })
            .collect();
        Self { specs }
    }

    pub fn from_specs(specs: Vec<CanonicalFieldSpec>) -> EngineResult<Self> {
        for (idx, spec) in specs.iter().enumerate() {
            spec.ensure_valid()?;
            let duplicate = specs[..idx].iter().any(|earlier| {
                earlier.analysis_type == spec.analysis_type
                    && earlier.field_name == spec.field_name
            });
            if duplicate {
                return Err(EngineError::DuplicateField {
                    field: spec.field_name.clone(),
                    analysis: spec.analysis_type,
                });
            }
        }
        Ok(Self { specs })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening catalog file {path:?}"))?;
        let parsed: CatalogFile = serde_yaml::from_reader(BufReader::new(file))
            .with_context(|| format!("Parsing catalog YAML {path:?}"))?;
        Self::from_specs(parsed.fields).with_context(|| format!("Validating catalog {path:?}"))
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        let file = CatalogFile {
            fields: self.specs.clone(),
        };
        serde_yaml::to_string(&file).context("Serializing catalog to YAML")
    }

    pub fn fields(&self, analysis: AnalysisType) -> impl Iterator<Item = &CanonicalFieldSpec> {
        self.specs
            .iter()
            .filter(move |spec| spec.analysis_type == analysis)
    }

    pub fn spec(&self, analysis: AnalysisType, field: &str) -> EngineResult<&CanonicalFieldSpec> {
        self.fields(analysis)
            .find(|spec| spec.field_name == field)
            .ok_or_else(|| EngineError::UnknownField {
                field: field.to_string(),
                analysis,
            })
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_passes_validation() {
        let builtin = Catalog::builtin();
        let revalidated = Catalog::from_specs(builtin.specs.clone()).expect("valid catalog");
        assert_eq!(revalidated.len(), builtin.len());
        for analysis in AnalysisType::variants() {
            assert!(builtin.fields(*analysis).count() > 0);
        }
    }

    #[test]
    fn first_alias_is_the_field_name() {
        for spec in Catalog::builtin().specs {
            assert_eq!(spec.aliases[0], spec.field_name);
        }
    }

    #[test]
    fn empty_alias_list_is_rejected() {
        let spec = CanonicalFieldSpec::new("customer_name", AnalysisType::Customer, FieldKind::Text, &[]);
        let err = Catalog::from_specs(vec![spec]).expect_err("empty aliases");
        assert!(matches!(err, EngineError::EmptyAliases { .. }));
    }

    #[test]
    fn duplicate_fields_are_rejected_per_analysis_type() {
        let specs = vec![
            CanonicalFieldSpec::new("phone", AnalysisType::Order, FieldKind::Phone, &["phone"]),
            CanonicalFieldSpec::new("phone", AnalysisType::Customer, FieldKind::Phone, &["phone"]),
            CanonicalFieldSpec::new("phone", AnalysisType::Order, FieldKind::Phone, &["mobile"]),
        ];
        let err = Catalog::from_specs(specs).expect_err("duplicate");
        assert!(matches!(
            err,
            EngineError::DuplicateField {
                analysis: AnalysisType::Order,
                ..
            }
        ));
    }

    #[test]
    fn unknown_field_lookup_is_an_error() {
        let catalog = Catalog::builtin();
        assert!(catalog.spec(AnalysisType::Product, fields::PRODUCT_NAME).is_ok());
        let err = catalog
            .spec(AnalysisType::Product, fields::EMAIL)
            .expect_err("email is not a product field");
        assert_eq!(
            err.to_string(),
            "Canonical field 'email' is not defined for product"
        );
    }

    #[test]
    fn analysis_type_parses_plural_forms() {
        assert_eq!(
            "Customers".parse::<AnalysisType>().unwrap(),
            AnalysisType::Customer
        );
        assert!("invoice".parse::<AnalysisType>().is_err());
    }

    #[test]
    fn catalog_round_trips_through_yaml() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        let yaml = Catalog::builtin().to_yaml_string().expect("yaml");
        std::io::Write::write_all(&mut file, yaml.as_bytes()).expect("write");
        let loaded = Catalog::load(file.path()).expect("load catalog");
        assert_eq!(loaded.len(), Catalog::builtin().len());
    }
}
