//! Scenario replay against a fresh `ProcurementServices`.

use std::collections::HashMap;
use std::fmt;

use anyhow::{Context, bail};
use tracing::{info, warn};

use procura_core::TenantId;
use procura_infra::{NewPurchaseLine, ProcurementServices};
use procura_parties::PartyId;
use procura_payments::PaymentTypeId;
use procura_purchasing::PurchaseOrderId;

use crate::model::{Action, PurchaseSpec, Scenario};

/// One expectation and what actually happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOutcome {
    pub subject: String,
    pub expected: String,
    pub actual: String,
}

impl CheckOutcome {
    pub fn passed(&self) -> bool {
        self.expected == self.actual
    }
}

impl fmt::Display for CheckOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = if self.passed() { "ok" } else { "FAILED" };
        write!(f, "[{mark}] {}: expected {}, got {}", self.subject, self.expected, self.actual)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScenarioReport {
    pub name: String,
    pub checks: Vec<CheckOutcome>,
}

impl ScenarioReport {
    pub fn failures(&self) -> impl Iterator<Item = &CheckOutcome> {
        self.checks.iter().filter(|c| !c.passed())
    }

    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }
}

/// Replay `scenario` in a new tenant and collect the outcome of every check.
///
/// Unmet expectations end up in the report; malformed scenarios (unknown
/// keys, operations failing where no refusal was expected) are errors.
pub fn run(scenario: &Scenario) -> anyhow::Result<ScenarioReport> {
    let mut runner = Runner {
        services: ProcurementServices::new(),
        tenant_id: TenantId::new(),
        payment_types: HashMap::new(),
        parties: HashMap::new(),
        purchases: HashMap::new(),
        report: ScenarioReport {
            name: scenario.name.clone(),
            checks: vec![],
        },
    };
    info!(scenario = %scenario.name, tenant_id = %runner.tenant_id, "replaying scenario");

    for pt in &scenario.payment_types {
        let id = runner
            .services
            .create_payment_type(runner.tenant_id, &pt.name, pt.kind)
            .with_context(|| format!("creating payment type '{}'", pt.key))?;
        runner.payment_types.insert(pt.key.clone(), id);
    }

    for party in &scenario.parties {
        let id = runner
            .services
            .register_party(runner.tenant_id, &party.name, party.kind, None)
            .with_context(|| format!("registering party '{}'", party.key))?;
        let supplier = runner.optional_payment_type(party.supplier_payment_type.as_deref())?;
        let customer = runner.optional_payment_type(party.customer_payment_type.as_deref())?;
        if supplier.is_some() || customer.is_some() {
            runner
                .services
                .set_party_payment_types(runner.tenant_id, id, supplier, customer)
                .with_context(|| format!("setting payment types of party '{}'", party.key))?;
        }
        runner.parties.insert(party.key.clone(), id);
    }

    if let Some(expected) = &scenario.expect_default_payment_type {
        let actual = runner.services.default_purchase_payment_type(runner.tenant_id);
        runner.check_payment_type("default purchase payment type", expected.as_deref(), actual);
    }

    for purchase in &scenario.purchases {
        runner
            .purchase(purchase)
            .with_context(|| format!("purchase '{}'", purchase.key))?;
    }

    for (idx, action) in scenario.actions.iter().enumerate() {
        runner
            .action(action)
            .with_context(|| format!("action #{}", idx + 1))?;
    }

    let report = runner.report;
    info!(
        scenario = %report.name,
        checks = report.checks.len(),
        failures = report.failures().count(),
        "scenario replayed"
    );
    Ok(report)
}

struct Runner {
    services: ProcurementServices,
    tenant_id: TenantId,
    payment_types: HashMap<String, PaymentTypeId>,
    parties: HashMap<String, PartyId>,
    purchases: HashMap<String, PurchaseOrderId>,
    report: ScenarioReport,
}

impl Runner {
    fn purchase(&mut self, spec: &PurchaseSpec) -> anyhow::Result<()> {
        let party = self.optional_party(spec.party.as_deref())?;
        let order_id = self.services.create_purchase(self.tenant_id, party)?;
        self.purchases.insert(spec.key.clone(), order_id);

        if let Some(choice) = &spec.payment_type {
            let payment_type = self.optional_payment_type(choice.as_deref())?;
            self.services
                .set_purchase_payment_type(self.tenant_id, order_id, payment_type)?;
        }
        for line in &spec.lines {
            self.services.add_purchase_line(
                self.tenant_id,
                order_id,
                NewPurchaseLine {
                    line_type: line.line_type,
                    description: line.description.clone(),
                    quantity: line.quantity,
                    unit_price: line.unit_price,
                },
            )?;
        }

        let order = self
            .services
            .purchase_order(self.tenant_id, order_id)
            .context("purchase order missing from the read model")?;
        if let Some(expected) = &spec.expect.purchase_payment_type {
            self.check_payment_type(
                &format!("{}: purchase payment type", spec.key),
                expected.as_deref(),
                order.payment_type,
            );
        }
        if let Some(expected) = spec.expect.untaxed_amount {
            self.check(
                &format!("{}: untaxed amount", spec.key),
                expected.normalize().to_string(),
                order.untaxed_amount.normalize().to_string(),
            );
        }

        if !spec.approve {
            return Ok(());
        }
        self.services.approve_purchase(self.tenant_id, order_id)?;
        let invoice = match self.services.create_invoice(self.tenant_id, order_id)? {
            Some(invoice_id) => self.services.invoice(self.tenant_id, invoice_id),
            None => None,
        };

        if let Some(expected) = spec.expect.invoiced {
            self.check(
                &format!("{}: invoiced", spec.key),
                expected.to_string(),
                invoice.is_some().to_string(),
            );
        }
        if let Some(expected) = &spec.expect.invoice_payment_type {
            let Some(invoice) = &invoice else {
                bail!("expects an invoice payment type but nothing was invoiced");
            };
            self.check_payment_type(
                &format!("{}: invoice payment type", spec.key),
                expected.as_deref(),
                invoice.payment_type,
            );
        }
        Ok(())
    }

    fn action(&mut self, action: &Action) -> anyhow::Result<()> {
        let tenant_id = self.tenant_id;
        let (subject, expect_refused, result) = match action {
            Action::RenamePaymentType {
                payment_type,
                name,
                expect_refused,
            } => {
                let id = self.payment_type(payment_type)?;
                (
                    format!("rename payment type '{payment_type}'"),
                    *expect_refused,
                    self.services.update_payment_type(tenant_id, id, Some(name.as_str()), None),
                )
            }
            Action::ChangePaymentTypeKind {
                payment_type,
                kind,
                expect_refused,
            } => {
                let id = self.payment_type(payment_type)?;
                (
                    format!("change kind of payment type '{payment_type}' to {kind}"),
                    *expect_refused,
                    self.services.update_payment_type(tenant_id, id, None, Some(*kind)),
                )
            }
            Action::DeletePaymentType {
                payment_type,
                expect_refused,
            } => {
                let id = self.payment_type(payment_type)?;
                (
                    format!("delete payment type '{payment_type}'"),
                    *expect_refused,
                    self.services.delete_payment_type(tenant_id, id),
                )
            }
            Action::SetPurchasePaymentType {
                purchase,
                payment_type,
                expect_refused,
            } => {
                let order_id = self.purchase_id(purchase)?;
                let id = self.optional_payment_type(payment_type.as_deref())?;
                (
                    format!("set payment type of purchase '{purchase}'"),
                    *expect_refused,
                    self.services.set_purchase_payment_type(tenant_id, order_id, id),
                )
            }
            Action::ChangePurchaseParty {
                purchase,
                party,
                expect_payment_type,
                expect_refused,
            } => {
                let order_id = self.purchase_id(purchase)?;
                let party_id = self.optional_party(party.as_deref())?;
                let result = self.services.change_purchase_party(tenant_id, order_id, party_id);
                if let (Ok(actual), Some(expected)) = (&result, expect_payment_type) {
                    self.check_payment_type(
                        &format!("purchase '{purchase}' payment type after party change"),
                        expected.as_deref(),
                        *actual,
                    );
                }
                (
                    format!("change party of purchase '{purchase}'"),
                    *expect_refused,
                    result.map(|_| ()),
                )
            }
        };

        let refused = match result {
            Ok(()) => false,
            Err(err) if err.as_domain().is_some() => {
                info!(%err, "{subject} refused");
                true
            }
            Err(err) => return Err(anyhow::Error::new(err).context(subject)),
        };
        self.check(&subject, refusal(expect_refused), refusal(refused));
        Ok(())
    }

    fn check(&mut self, subject: &str, expected: String, actual: String) {
        let outcome = CheckOutcome {
            subject: subject.to_string(),
            expected,
            actual,
        };
        if !outcome.passed() {
            warn!(%outcome, "expectation not met");
        }
        self.report.checks.push(outcome);
    }

    fn check_payment_type(&mut self, subject: &str, expected: Option<&str>, actual: Option<PaymentTypeId>) {
        let actual = self.payment_type_label(actual);
        self.check(subject, expected.unwrap_or("none").to_string(), actual);
    }

    fn payment_type_label(&self, id: Option<PaymentTypeId>) -> String {
        match id {
            None => "none".to_string(),
            Some(id) => self
                .payment_types
                .iter()
                .find(|(_, v)| **v == id)
                .map(|(k, _)| k.clone())
                .unwrap_or_else(|| id.to_string()),
        }
    }

    fn payment_type(&self, key: &str) -> anyhow::Result<PaymentTypeId> {
        match self.payment_types.get(key) {
            Some(id) => Ok(*id),
            None => bail!("unknown payment type key '{key}'"),
        }
    }

    fn optional_payment_type(&self, key: Option<&str>) -> anyhow::Result<Option<PaymentTypeId>> {
        key.map(|k| self.payment_type(k)).transpose()
    }

    fn optional_party(&self, key: Option<&str>) -> anyhow::Result<Option<PartyId>> {
        key.map(|k| match self.parties.get(k) {
            Some(id) => Ok(*id),
            None => bail!("unknown party key '{k}'"),
        })
        .transpose()
    }

    fn purchase_id(&self, key: &str) -> anyhow::Result<PurchaseOrderId> {
        match self.purchases.get(key) {
            Some(id) => Ok(*id),
            None => bail!("unknown purchase key '{key}'"),
        }
    }
}

fn refusal(refused: bool) -> String {
    let label = if refused { "refused" } else { "accepted" };
    label.to_string()
}

/// Fail with every unmet expectation listed.
pub fn ensure_success(report: &ScenarioReport) -> anyhow::Result<()> {
    if report.is_success() {
        return Ok(());
    }
    let failures: Vec<String> = report.failures().map(ToString::to_string).collect();
    bail!(
        "scenario '{}' has {} unmet expectation(s):\n{}",
        report.name,
        failures.len(),
        failures.join("\n")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario(json: &str) -> Scenario {
        Scenario::from_json(json).unwrap()
    }

    #[test]
    fn credit_note_scenario_passes() {
        let report = run(&scenario(
            r#"{
                "name": "credit note",
                "payment_types": [
                    {"key": "transfer", "name": "Bank transfer", "kind": "payable"},
                    {"key": "debit", "name": "Direct debit", "kind": "receivable"}
                ],
                "parties": [
                    {"key": "acme", "name": "Acme", "supplier_payment_type": "transfer", "customer_payment_type": "debit"}
                ],
                "expect_default_payment_type": "transfer",
                "purchases": [{
                    "key": "refund",
                    "party": "acme",
                    "lines": [
                        {"description": "Pallets", "quantity": "2", "unit_price": "10.00"},
                        {"description": "Rebate", "quantity": "1", "unit_price": "-25.00"}
                    ],
                    "expect": {
                        "purchase_payment_type": "transfer",
                        "untaxed_amount": "-5",
                        "invoiced": true,
                        "invoice_payment_type": "debit"
                    }
                }]
            }"#,
        ))
        .unwrap();

        assert!(report.is_success(), "{:?}", report.failures().collect::<Vec<_>>());
        assert_eq!(report.checks.len(), 5);
        ensure_success(&report).unwrap();
    }

    #[test]
    fn unmet_expectation_is_reported_not_raised() {
        let report = run(&scenario(
            r#"{
                "name": "wrong",
                "payment_types": [{"key": "transfer", "name": "Bank transfer", "kind": "payable"}],
                "expect_default_payment_type": null
            }"#,
        ))
        .unwrap();

        assert!(!report.is_success());
        let failure = report.failures().next().unwrap();
        assert_eq!(failure.expected, "none");
        assert_eq!(failure.actual, "transfer");
        assert!(ensure_success(&report).is_err());
    }

    #[test]
    fn unknown_key_is_an_error() {
        let err = run(&scenario(
            r#"{"name": "broken", "parties": [{"key": "acme", "name": "Acme", "supplier_payment_type": "nope"}]}"#,
        ))
        .unwrap_err();
        assert!(format!("{err:#}").contains("unknown payment type key 'nope'"));
    }
}
