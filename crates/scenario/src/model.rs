//! Scenario file format.
//!
//! Records reference each other through string keys chosen by the author
//! (`"transfer"`, `"acme"`); ids are generated at replay time.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};

use procura_invoicing::LineType;
use procura_parties::PartyKind;
use procura_payments::PaymentKind;

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub name: String,
    #[serde(default)]
    pub payment_types: Vec<PaymentTypeSpec>,
    #[serde(default)]
    pub parties: Vec<PartySpec>,
    /// Expected default payment type of a new purchase once the payment
    /// types exist (`null` for none).
    #[serde(default, deserialize_with = "double_option")]
    pub expect_default_payment_type: Option<Option<String>>,
    #[serde(default)]
    pub purchases: Vec<PurchaseSpec>,
    /// Run after every purchase is processed.
    #[serde(default)]
    pub actions: Vec<Action>,
}

impl Scenario {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentTypeSpec {
    pub key: String,
    pub name: String,
    pub kind: PaymentKind,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PartySpec {
    pub key: String,
    pub name: String,
    #[serde(default = "supplier")]
    pub kind: PartyKind,
    pub supplier_payment_type: Option<String>,
    pub customer_payment_type: Option<String>,
}

fn supplier() -> PartyKind {
    PartyKind::Supplier
}

#[derive(Debug, Clone, Deserialize)]
pub struct PurchaseSpec {
    pub key: String,
    pub party: Option<String>,
    /// Explicit payment type chosen after the party (`null` clears it,
    /// absent keeps what the default and party produced).
    #[serde(default, deserialize_with = "double_option")]
    pub payment_type: Option<Option<String>>,
    #[serde(default)]
    pub lines: Vec<LineSpec>,
    #[serde(default = "yes")]
    pub approve: bool,
    #[serde(default)]
    pub expect: PurchaseExpectation,
}

fn yes() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct LineSpec {
    #[serde(rename = "type", default)]
    pub line_type: LineType,
    #[serde(default)]
    pub description: String,
    pub quantity: Option<Decimal>,
    pub unit_price: Option<Decimal>,
}

/// Checks on one purchase. Absent fields are not checked.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PurchaseExpectation {
    #[serde(default, deserialize_with = "double_option")]
    pub purchase_payment_type: Option<Option<String>>,
    pub untaxed_amount: Option<Decimal>,
    /// `false` when the purchase has nothing to invoice.
    pub invoiced: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub invoice_payment_type: Option<Option<String>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    RenamePaymentType {
        payment_type: String,
        name: String,
        #[serde(default)]
        expect_refused: bool,
    },
    ChangePaymentTypeKind {
        payment_type: String,
        kind: PaymentKind,
        #[serde(default)]
        expect_refused: bool,
    },
    DeletePaymentType {
        payment_type: String,
        #[serde(default)]
        expect_refused: bool,
    },
    SetPurchasePaymentType {
        purchase: String,
        payment_type: Option<String>,
        #[serde(default)]
        expect_refused: bool,
    },
    ChangePurchaseParty {
        purchase: String,
        party: Option<String>,
        #[serde(default, deserialize_with = "double_option")]
        expect_payment_type: Option<Option<String>>,
        #[serde(default)]
        expect_refused: bool,
    },
}

/// Distinguish an absent field (`None`) from an explicit `null` (`Some(None)`).
fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
