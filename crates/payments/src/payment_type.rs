use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use procura_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId, ValueObject};
use procura_events::Event;

use crate::references::{PaymentTypeUsage, describe};

/// Stream type for payment type aggregates.
pub const AGGREGATE_TYPE: &str = "payments.payment_type";

/// Payment type identifier (tenant-scoped via `tenant_id` fields in events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentTypeId(pub AggregateId);

impl PaymentTypeId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for PaymentTypeId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Which direction of settlement a payment type describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentKind {
    Payable,
    Receivable,
    Both,
}

impl PaymentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentKind::Payable => "payable",
            PaymentKind::Receivable => "receivable",
            PaymentKind::Both => "both",
        }
    }

    /// Whether a payment type of this kind may settle documents of `direction`.
    ///
    /// `Both` settles either direction; the others only their own.
    pub fn covers(self, direction: PaymentKind) -> bool {
        self == PaymentKind::Both || self == direction
    }
}

impl core::fmt::Display for PaymentKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for PaymentKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "payable" => Ok(PaymentKind::Payable),
            "receivable" => Ok(PaymentKind::Receivable),
            "both" => Ok(PaymentKind::Both),
            other => Err(DomainError::validation(format!(
                "unknown payment kind '{other}' (expected payable, receivable or both)"
            ))),
        }
    }
}

/// Snapshot of a payment type's identity and kind.
///
/// Commands of other aggregates carry this so their decisions can check the
/// kind without loading the payment type themselves.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaymentTypeRef {
    pub id: PaymentTypeId,
    pub kind: PaymentKind,
}

impl ValueObject for PaymentTypeRef {}

impl PaymentTypeRef {
    pub fn new(id: PaymentTypeId, kind: PaymentKind) -> Self {
        Self { id, kind }
    }
}

/// Aggregate root: PaymentType.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentType {
    id: PaymentTypeId,
    tenant_id: Option<TenantId>,
    name: String,
    kind: PaymentKind,
    deleted: bool,
    version: u64,
    created: bool,
}

impl PaymentType {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: PaymentTypeId) -> Self {
        Self {
            id,
            tenant_id: None,
            name: String::new(),
            kind: PaymentKind::Payable,
            deleted: false,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> PaymentTypeId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> PaymentKind {
        self.kind
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    pub fn to_ref(&self) -> PaymentTypeRef {
        PaymentTypeRef::new(self.id, self.kind)
    }
}

impl AggregateRoot for PaymentType {
    type Id = PaymentTypeId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreatePaymentType.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePaymentType {
    pub tenant_id: TenantId,
    pub payment_type_id: PaymentTypeId,
    pub name: String,
    pub kind: PaymentKind,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdatePaymentType.
///
/// `usages` lists the registered fields currently referencing this payment
/// type; the host fills it in before dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatePaymentType {
    pub tenant_id: TenantId,
    pub payment_type_id: PaymentTypeId,
    pub name: Option<String>,
    pub kind: Option<PaymentKind>,
    pub usages: Vec<PaymentTypeUsage>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DeletePaymentType.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletePaymentType {
    pub tenant_id: TenantId,
    pub payment_type_id: PaymentTypeId,
    pub usages: Vec<PaymentTypeUsage>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentTypeCommand {
    CreatePaymentType(CreatePaymentType),
    UpdatePaymentType(UpdatePaymentType),
    DeletePaymentType(DeletePaymentType),
}

/// Event: PaymentTypeCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentTypeCreated {
    pub tenant_id: TenantId,
    pub payment_type_id: PaymentTypeId,
    pub name: String,
    pub kind: PaymentKind,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PaymentTypeUpdated (carries the full resulting state).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentTypeUpdated {
    pub tenant_id: TenantId,
    pub payment_type_id: PaymentTypeId,
    pub name: String,
    pub kind: PaymentKind,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PaymentTypeDeleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentTypeDeleted {
    pub tenant_id: TenantId,
    pub payment_type_id: PaymentTypeId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentTypeEvent {
    PaymentTypeCreated(PaymentTypeCreated),
    PaymentTypeUpdated(PaymentTypeUpdated),
    PaymentTypeDeleted(PaymentTypeDeleted),
}

impl PaymentTypeEvent {
    pub fn tenant_and_id(&self) -> (TenantId, PaymentTypeId) {
        match self {
            PaymentTypeEvent::PaymentTypeCreated(e) => (e.tenant_id, e.payment_type_id),
            PaymentTypeEvent::PaymentTypeUpdated(e) => (e.tenant_id, e.payment_type_id),
            PaymentTypeEvent::PaymentTypeDeleted(e) => (e.tenant_id, e.payment_type_id),
        }
    }
}

impl Event for PaymentTypeEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PaymentTypeEvent::PaymentTypeCreated(_) => "payments.payment_type.created",
            PaymentTypeEvent::PaymentTypeUpdated(_) => "payments.payment_type.updated",
            PaymentTypeEvent::PaymentTypeDeleted(_) => "payments.payment_type.deleted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PaymentTypeEvent::PaymentTypeCreated(e) => e.occurred_at,
            PaymentTypeEvent::PaymentTypeUpdated(e) => e.occurred_at,
            PaymentTypeEvent::PaymentTypeDeleted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for PaymentType {
    type Command = PaymentTypeCommand;
    type Event = PaymentTypeEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PaymentTypeEvent::PaymentTypeCreated(e) => {
                self.id = e.payment_type_id;
                self.tenant_id = Some(e.tenant_id);
                self.name = e.name.clone();
                self.kind = e.kind;
                self.deleted = false;
                self.created = true;
            }
            PaymentTypeEvent::PaymentTypeUpdated(e) => {
                self.name = e.name.clone();
                self.kind = e.kind;
            }
            PaymentTypeEvent::PaymentTypeDeleted(_) => {
                self.deleted = true;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            PaymentTypeCommand::CreatePaymentType(cmd) => self.handle_create(cmd),
            PaymentTypeCommand::UpdatePaymentType(cmd) => self.handle_update(cmd),
            PaymentTypeCommand::DeletePaymentType(cmd) => self.handle_delete(cmd),
        }
    }
}

impl PaymentType {
    fn ensure_live(&self, tenant_id: TenantId, payment_type_id: PaymentTypeId) -> Result<(), DomainError> {
        if !self.created || self.deleted {
            return Err(DomainError::not_found());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        if self.id != payment_type_id {
            return Err(DomainError::invariant("payment_type_id mismatch"));
        }
        Ok(())
    }

    fn ensure_unreferenced(&self, action: &str, usages: &[PaymentTypeUsage]) -> Result<(), DomainError> {
        if usages.iter().all(|u| u.count == 0) {
            return Ok(());
        }
        Err(DomainError::referenced(format!(
            "cannot {action} payment type \"{}\" because it is used by {}",
            self.name,
            describe(usages)
        )))
    }

    fn handle_create(&self, cmd: &CreatePaymentType) -> Result<Vec<PaymentTypeEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("payment type already exists"));
        }
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }

        Ok(vec![PaymentTypeEvent::PaymentTypeCreated(PaymentTypeCreated {
            tenant_id: cmd.tenant_id,
            payment_type_id: cmd.payment_type_id,
            name: cmd.name.trim().to_string(),
            kind: cmd.kind,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdatePaymentType) -> Result<Vec<PaymentTypeEvent>, DomainError> {
        self.ensure_live(cmd.tenant_id, cmd.payment_type_id)?;

        let name = match &cmd.name {
            Some(n) if n.trim().is_empty() => {
                return Err(DomainError::validation("name cannot be empty"));
            }
            Some(n) => n.trim().to_string(),
            None => self.name.clone(),
        };
        let kind = cmd.kind.unwrap_or(self.kind);

        if kind != self.kind {
            self.ensure_unreferenced("change the kind of", &cmd.usages)?;
        }

        if name == self.name && kind == self.kind {
            return Ok(vec![]);
        }

        Ok(vec![PaymentTypeEvent::PaymentTypeUpdated(PaymentTypeUpdated {
            tenant_id: cmd.tenant_id,
            payment_type_id: cmd.payment_type_id,
            name,
            kind,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_delete(&self, cmd: &DeletePaymentType) -> Result<Vec<PaymentTypeEvent>, DomainError> {
        self.ensure_live(cmd.tenant_id, cmd.payment_type_id)?;
        self.ensure_unreferenced("delete", &cmd.usages)?;

        Ok(vec![PaymentTypeEvent::PaymentTypeDeleted(PaymentTypeDeleted {
            tenant_id: cmd.tenant_id,
            payment_type_id: cmd.payment_type_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::references::RelatedField;
    use procura_events::execute;
    use proptest::prelude::*;

    fn test_tenant_id() -> TenantId {
        TenantId::new()
    }

    fn test_payment_type_id() -> PaymentTypeId {
        PaymentTypeId::new(AggregateId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn purchase_usage(count: usize) -> PaymentTypeUsage {
        PaymentTypeUsage {
            field: RelatedField::new("purchasing.order", "payment_type"),
            count,
        }
    }

    fn created(kind: PaymentKind) -> (PaymentType, TenantId, PaymentTypeId) {
        let tenant_id = test_tenant_id();
        let payment_type_id = test_payment_type_id();
        let mut payment_type = PaymentType::empty(payment_type_id);
        execute(
            &mut payment_type,
            &PaymentTypeCommand::CreatePaymentType(CreatePaymentType {
                tenant_id,
                payment_type_id,
                name: "Bank transfer".to_string(),
                kind,
                occurred_at: test_time(),
            }),
        )
        .unwrap();
        (payment_type, tenant_id, payment_type_id)
    }

    fn update(
        tenant_id: TenantId,
        payment_type_id: PaymentTypeId,
        name: Option<&str>,
        kind: Option<PaymentKind>,
        usages: Vec<PaymentTypeUsage>,
    ) -> PaymentTypeCommand {
        PaymentTypeCommand::UpdatePaymentType(UpdatePaymentType {
            tenant_id,
            payment_type_id,
            name: name.map(str::to_string),
            kind,
            usages,
            occurred_at: test_time(),
        })
    }

    #[test]
    fn create_emits_created_event_with_trimmed_name() {
        let payment_type = PaymentType::empty(test_payment_type_id());
        let tenant_id = test_tenant_id();
        let payment_type_id = test_payment_type_id();

        let events = payment_type
            .handle(&PaymentTypeCommand::CreatePaymentType(CreatePaymentType {
                tenant_id,
                payment_type_id,
                name: "  Direct debit ".to_string(),
                kind: PaymentKind::Receivable,
                occurred_at: test_time(),
            }))
            .unwrap();

        match &events[0] {
            PaymentTypeEvent::PaymentTypeCreated(e) => {
                assert_eq!(e.name, "Direct debit");
                assert_eq!(e.kind, PaymentKind::Receivable);
                assert_eq!(e.payment_type_id, payment_type_id);
            }
            _ => panic!("Expected PaymentTypeCreated event"),
        }
    }

    #[test]
    fn create_rejects_blank_name() {
        let payment_type = PaymentType::empty(test_payment_type_id());
        let err = payment_type
            .handle(&PaymentTypeCommand::CreatePaymentType(CreatePaymentType {
                tenant_id: test_tenant_id(),
                payment_type_id: test_payment_type_id(),
                name: " ".to_string(),
                kind: PaymentKind::Both,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn kind_change_is_refused_while_referenced() {
        let (payment_type, tenant_id, id) = created(PaymentKind::Payable);

        let err = payment_type
            .handle(&update(tenant_id, id, None, Some(PaymentKind::Receivable), vec![purchase_usage(3)]))
            .unwrap_err();
        match err {
            DomainError::Referenced(msg) => {
                assert!(msg.contains("change the kind"));
                assert!(msg.contains("purchasing.order.payment_type (3 records)"));
            }
            _ => panic!("Expected Referenced error"),
        }
    }

    #[test]
    fn rename_is_allowed_while_referenced() {
        let (mut payment_type, tenant_id, id) = created(PaymentKind::Payable);

        execute(
            &mut payment_type,
            &update(tenant_id, id, Some("Wire"), None, vec![purchase_usage(1)]),
        )
        .unwrap();
        assert_eq!(payment_type.name(), "Wire");
        assert_eq!(payment_type.kind(), PaymentKind::Payable);
    }

    #[test]
    fn kind_change_is_allowed_when_unreferenced() {
        let (mut payment_type, tenant_id, id) = created(PaymentKind::Payable);

        execute(
            &mut payment_type,
            &update(tenant_id, id, None, Some(PaymentKind::Both), vec![purchase_usage(0)]),
        )
        .unwrap();
        assert_eq!(payment_type.kind(), PaymentKind::Both);
    }

    #[test]
    fn no_op_update_emits_nothing() {
        let (payment_type, tenant_id, id) = created(PaymentKind::Payable);
        let events = payment_type
            .handle(&update(tenant_id, id, Some("Bank transfer"), Some(PaymentKind::Payable), vec![]))
            .unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn delete_is_refused_while_referenced_and_final_otherwise() {
        let (mut payment_type, tenant_id, id) = created(PaymentKind::Both);

        let referenced = PaymentTypeCommand::DeletePaymentType(DeletePaymentType {
            tenant_id,
            payment_type_id: id,
            usages: vec![purchase_usage(1)],
            occurred_at: test_time(),
        });
        assert!(matches!(
            payment_type.handle(&referenced).unwrap_err(),
            DomainError::Referenced(_)
        ));

        let free = PaymentTypeCommand::DeletePaymentType(DeletePaymentType {
            tenant_id,
            payment_type_id: id,
            usages: vec![],
            occurred_at: test_time(),
        });
        execute(&mut payment_type, &free).unwrap();
        assert!(payment_type.is_deleted());
        assert_eq!(payment_type.version(), 2);

        let err = payment_type
            .handle(&update(tenant_id, id, Some("Again"), None, vec![]))
            .unwrap_err();
        assert_eq!(err, DomainError::NotFound);
    }

    #[test]
    fn kind_parses_case_insensitively() {
        assert_eq!("Payable".parse::<PaymentKind>().unwrap(), PaymentKind::Payable);
        assert_eq!(" BOTH ".parse::<PaymentKind>().unwrap(), PaymentKind::Both);
        assert!("cash".parse::<PaymentKind>().is_err());
    }

    fn any_kind() -> impl Strategy<Value = PaymentKind> {
        prop_oneof![
            Just(PaymentKind::Payable),
            Just(PaymentKind::Receivable),
            Just(PaymentKind::Both),
        ]
    }

    proptest! {
        /// Property: `Both` covers every direction; other kinds cover exactly themselves.
        #[test]
        fn covers_matches_kind_semantics(kind in any_kind(), direction in any_kind()) {
            let expected = kind == PaymentKind::Both || kind == direction;
            prop_assert_eq!(kind.covers(direction), expected);
        }
    }
}
