use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use procura_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId, ValueObject};
use procura_events::Event;
use procura_payments::{PaymentKind, PaymentTypeId, PaymentTypeRef, RelatedField};

/// Stream type for party aggregates.
pub const AGGREGATE_TYPE: &str = "parties.party";

/// Registered reference: the supplier-role default payment type.
pub const SUPPLIER_PAYMENT_TYPE_FIELD: RelatedField =
    RelatedField::new(AGGREGATE_TYPE, "supplier_payment_type");

/// Registered reference: the customer-role default payment type.
pub const CUSTOMER_PAYMENT_TYPE_FIELD: RelatedField =
    RelatedField::new(AGGREGATE_TYPE, "customer_payment_type");

/// Party identifier (tenant-scoped via `tenant_id` fields in events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartyId(pub AggregateId);

impl PartyId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for PartyId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Primary role of a party. Both roles' payment defaults may be set either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartyKind {
    Customer,
    Supplier,
}

/// Party status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartyStatus {
    Active,
    Suspended,
}

/// Contact information for a party.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// A party's default payment types per role.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyPaymentTypes {
    /// Used when the party acts as supplier (amounts we pay).
    pub supplier: Option<PaymentTypeId>,
    /// Used when the party acts as customer (amounts we receive).
    pub customer: Option<PaymentTypeId>,
}

impl ValueObject for PartyPaymentTypes {}

impl PartyPaymentTypes {
    /// The default for the given settlement direction.
    ///
    /// `Payable` reads the supplier default, `Receivable` the customer default.
    /// `Both` is not a role and has no default.
    pub fn for_kind(&self, kind: PaymentKind) -> Option<PaymentTypeId> {
        match kind {
            PaymentKind::Payable => self.supplier,
            PaymentKind::Receivable => self.customer,
            PaymentKind::Both => None,
        }
    }

    /// Whether `payment_type` is one of the two defaults.
    pub fn references(&self, payment_type: PaymentTypeId) -> bool {
        self.supplier == Some(payment_type) || self.customer == Some(payment_type)
    }
}

/// Aggregate root: Party (customer or supplier).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Party {
    id: PartyId,
    tenant_id: Option<TenantId>,
    kind: PartyKind,
    name: String,
    contact: ContactInfo,
    status: PartyStatus,
    payment_types: PartyPaymentTypes,
    version: u64,
    created: bool,
}

impl Party {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: PartyId) -> Self {
        Self {
            id,
            tenant_id: None,
            kind: PartyKind::Supplier,
            name: String::new(),
            contact: ContactInfo::default(),
            status: PartyStatus::Active,
            payment_types: PartyPaymentTypes::default(),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> PartyId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn kind(&self) -> PartyKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn contact(&self) -> &ContactInfo {
        &self.contact
    }

    pub fn status(&self) -> PartyStatus {
        self.status
    }

    pub fn payment_types(&self) -> PartyPaymentTypes {
        self.payment_types
    }

    pub fn supplier_payment_type(&self) -> Option<PaymentTypeId> {
        self.payment_types.supplier
    }

    pub fn customer_payment_type(&self) -> Option<PaymentTypeId> {
        self.payment_types.customer
    }

    /// Suspended parties cannot be put on new purchases.
    pub fn can_transact(&self) -> bool {
        self.status == PartyStatus::Active
    }
}

impl AggregateRoot for Party {
    type Id = PartyId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RegisterParty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterParty {
    pub tenant_id: TenantId,
    pub party_id: PartyId,
    pub kind: PartyKind,
    pub name: String,
    pub contact: Option<ContactInfo>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateDetails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateDetails {
    pub tenant_id: TenantId,
    pub party_id: PartyId,
    /// Optional new name (if None, keep existing).
    pub name: Option<String>,
    /// Optional new contact info (if None, keep existing).
    pub contact: Option<ContactInfo>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SuspendParty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuspendParty {
    pub tenant_id: TenantId,
    pub party_id: PartyId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SetPaymentTypes (replaces both role defaults).
///
/// The supplier default must be payable or both; the customer default must be
/// receivable or both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetPaymentTypes {
    pub tenant_id: TenantId,
    pub party_id: PartyId,
    pub supplier_payment_type: Option<PaymentTypeRef>,
    pub customer_payment_type: Option<PaymentTypeRef>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartyCommand {
    RegisterParty(RegisterParty),
    UpdateDetails(UpdateDetails),
    SuspendParty(SuspendParty),
    SetPaymentTypes(SetPaymentTypes),
}

/// Event: PartyRegistered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyRegistered {
    pub tenant_id: TenantId,
    pub party_id: PartyId,
    pub kind: PartyKind,
    pub name: String,
    pub contact: ContactInfo,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PartyUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyUpdated {
    pub tenant_id: TenantId,
    pub party_id: PartyId,
    pub name: String,
    pub contact: ContactInfo,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PartySuspended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartySuspended {
    pub tenant_id: TenantId,
    pub party_id: PartyId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PartyPaymentTypesChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyPaymentTypesChanged {
    pub tenant_id: TenantId,
    pub party_id: PartyId,
    pub payment_types: PartyPaymentTypes,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartyEvent {
    PartyRegistered(PartyRegistered),
    PartyUpdated(PartyUpdated),
    PartySuspended(PartySuspended),
    PartyPaymentTypesChanged(PartyPaymentTypesChanged),
}

impl PartyEvent {
    pub fn tenant_and_id(&self) -> (TenantId, PartyId) {
        match self {
            PartyEvent::PartyRegistered(e) => (e.tenant_id, e.party_id),
            PartyEvent::PartyUpdated(e) => (e.tenant_id, e.party_id),
            PartyEvent::PartySuspended(e) => (e.tenant_id, e.party_id),
            PartyEvent::PartyPaymentTypesChanged(e) => (e.tenant_id, e.party_id),
        }
    }
}

impl Event for PartyEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PartyEvent::PartyRegistered(_) => "parties.party.registered",
            PartyEvent::PartyUpdated(_) => "parties.party.updated",
            PartyEvent::PartySuspended(_) => "parties.party.suspended",
            PartyEvent::PartyPaymentTypesChanged(_) => "parties.party.payment_types_changed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PartyEvent::PartyRegistered(e) => e.occurred_at,
            PartyEvent::PartyUpdated(e) => e.occurred_at,
            PartyEvent::PartySuspended(e) => e.occurred_at,
            PartyEvent::PartyPaymentTypesChanged(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Party {
    type Command = PartyCommand;
    type Event = PartyEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PartyEvent::PartyRegistered(e) => {
                self.id = e.party_id;
                self.tenant_id = Some(e.tenant_id);
                self.kind = e.kind;
                self.name = e.name.clone();
                self.contact = e.contact.clone();
                self.status = PartyStatus::Active;
                self.created = true;
            }
            PartyEvent::PartyUpdated(e) => {
                self.name = e.name.clone();
                self.contact = e.contact.clone();
            }
            PartyEvent::PartySuspended(_) => {
                self.status = PartyStatus::Suspended;
            }
            PartyEvent::PartyPaymentTypesChanged(e) => {
                self.payment_types = e.payment_types;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            PartyCommand::RegisterParty(cmd) => self.handle_register(cmd),
            PartyCommand::UpdateDetails(cmd) => self.handle_update(cmd),
            PartyCommand::SuspendParty(cmd) => self.handle_suspend(cmd),
            PartyCommand::SetPaymentTypes(cmd) => self.handle_set_payment_types(cmd),
        }
    }
}

impl Party {
    fn ensure_existing(&self, tenant_id: TenantId, party_id: PartyId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        if self.id != party_id {
            return Err(DomainError::invariant("party_id mismatch"));
        }
        Ok(())
    }

    fn handle_register(&self, cmd: &RegisterParty) -> Result<Vec<PartyEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("party already exists"));
        }
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }

        Ok(vec![PartyEvent::PartyRegistered(PartyRegistered {
            tenant_id: cmd.tenant_id,
            party_id: cmd.party_id,
            kind: cmd.kind,
            name: cmd.name.clone(),
            contact: cmd.contact.clone().unwrap_or_default(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdateDetails) -> Result<Vec<PartyEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.party_id)?;

        let name = cmd.name.clone().unwrap_or_else(|| self.name.clone());
        if name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }

        Ok(vec![PartyEvent::PartyUpdated(PartyUpdated {
            tenant_id: cmd.tenant_id,
            party_id: cmd.party_id,
            name,
            contact: cmd.contact.clone().unwrap_or_else(|| self.contact.clone()),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_suspend(&self, cmd: &SuspendParty) -> Result<Vec<PartyEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.party_id)?;

        if self.status == PartyStatus::Suspended {
            return Err(DomainError::conflict("party is already suspended"));
        }

        Ok(vec![PartyEvent::PartySuspended(PartySuspended {
            tenant_id: cmd.tenant_id,
            party_id: cmd.party_id,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_set_payment_types(
        &self,
        cmd: &SetPaymentTypes,
    ) -> Result<Vec<PartyEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.party_id)?;

        if let Some(supplier) = cmd.supplier_payment_type {
            if !supplier.kind.covers(PaymentKind::Payable) {
                return Err(DomainError::validation(format!(
                    "supplier payment type must be payable or both, got {}",
                    supplier.kind
                )));
            }
        }
        if let Some(customer) = cmd.customer_payment_type {
            if !customer.kind.covers(PaymentKind::Receivable) {
                return Err(DomainError::validation(format!(
                    "customer payment type must be receivable or both, got {}",
                    customer.kind
                )));
            }
        }

        let payment_types = PartyPaymentTypes {
            supplier: cmd.supplier_payment_type.map(|r| r.id),
            customer: cmd.customer_payment_type.map(|r| r.id),
        };
        if payment_types == self.payment_types {
            return Ok(vec![]);
        }

        Ok(vec![PartyEvent::PartyPaymentTypesChanged(PartyPaymentTypesChanged {
            tenant_id: cmd.tenant_id,
            party_id: cmd.party_id,
            payment_types,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use procura_events::execute;

    fn test_tenant_id() -> TenantId {
        TenantId::new()
    }

    fn test_party_id() -> PartyId {
        PartyId::new(AggregateId::new())
    }

    fn test_payment_type(kind: PaymentKind) -> PaymentTypeRef {
        PaymentTypeRef::new(PaymentTypeId::new(AggregateId::new()), kind)
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn registered(kind: PartyKind) -> (Party, TenantId, PartyId) {
        let tenant_id = test_tenant_id();
        let party_id = test_party_id();
        let mut party = Party::empty(party_id);
        execute(
            &mut party,
            &PartyCommand::RegisterParty(RegisterParty {
                tenant_id,
                party_id,
                kind,
                name: "Acme Supplies".to_string(),
                contact: None,
                occurred_at: test_time(),
            }),
        )
        .unwrap();
        (party, tenant_id, party_id)
    }

    fn set_payment_types(
        tenant_id: TenantId,
        party_id: PartyId,
        supplier: Option<PaymentTypeRef>,
        customer: Option<PaymentTypeRef>,
    ) -> PartyCommand {
        PartyCommand::SetPaymentTypes(SetPaymentTypes {
            tenant_id,
            party_id,
            supplier_payment_type: supplier,
            customer_payment_type: customer,
            occurred_at: test_time(),
        })
    }

    #[test]
    fn register_party_emits_party_registered_event() {
        let party = Party::empty(test_party_id());
        let tenant_id = test_tenant_id();
        let party_id = test_party_id();
        let contact = ContactInfo {
            email: Some("ap@acme.test".to_string()),
            phone: None,
            address: None,
        };

        let events = party
            .handle(&PartyCommand::RegisterParty(RegisterParty {
                tenant_id,
                party_id,
                kind: PartyKind::Supplier,
                name: "Acme Supplies".to_string(),
                contact: Some(contact.clone()),
                occurred_at: test_time(),
            }))
            .unwrap();

        match &events[0] {
            PartyEvent::PartyRegistered(e) => {
                assert_eq!(e.party_id, party_id);
                assert_eq!(e.kind, PartyKind::Supplier);
                assert_eq!(e.contact, contact);
            }
            _ => panic!("Expected PartyRegistered event"),
        }
    }

    #[test]
    fn register_party_rejects_empty_name() {
        let party = Party::empty(test_party_id());
        let err = party
            .handle(&PartyCommand::RegisterParty(RegisterParty {
                tenant_id: test_tenant_id(),
                party_id: test_party_id(),
                kind: PartyKind::Supplier,
                name: "   ".to_string(),
                contact: None,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn new_party_has_no_payment_defaults() {
        let (party, _, _) = registered(PartyKind::Supplier);
        assert_eq!(party.payment_types(), PartyPaymentTypes::default());
    }

    #[test]
    fn set_payment_types_stores_both_role_defaults() {
        let (mut party, tenant_id, party_id) = registered(PartyKind::Supplier);
        let supplier = test_payment_type(PaymentKind::Payable);
        let customer = test_payment_type(PaymentKind::Both);

        execute(
            &mut party,
            &set_payment_types(tenant_id, party_id, Some(supplier), Some(customer)),
        )
        .unwrap();

        assert_eq!(party.supplier_payment_type(), Some(supplier.id));
        assert_eq!(party.customer_payment_type(), Some(customer.id));
        assert_eq!(party.version(), 2);
    }

    #[test]
    fn supplier_default_must_be_payable_side() {
        let (party, tenant_id, party_id) = registered(PartyKind::Supplier);
        let err = party
            .handle(&set_payment_types(
                tenant_id,
                party_id,
                Some(test_payment_type(PaymentKind::Receivable)),
                None,
            ))
            .unwrap_err();
        match err {
            DomainError::Validation(msg) => assert!(msg.contains("supplier payment type")),
            _ => panic!("Expected Validation error"),
        }
    }

    #[test]
    fn customer_default_must_be_receivable_side() {
        let (party, tenant_id, party_id) = registered(PartyKind::Customer);
        let err = party
            .handle(&set_payment_types(
                tenant_id,
                party_id,
                None,
                Some(test_payment_type(PaymentKind::Payable)),
            ))
            .unwrap_err();
        match err {
            DomainError::Validation(msg) => assert!(msg.contains("customer payment type")),
            _ => panic!("Expected Validation error"),
        }
    }

    #[test]
    fn unchanged_payment_types_emit_nothing() {
        let (mut party, tenant_id, party_id) = registered(PartyKind::Supplier);
        let supplier = test_payment_type(PaymentKind::Payable);
        execute(&mut party, &set_payment_types(tenant_id, party_id, Some(supplier), None)).unwrap();

        let events = party
            .handle(&set_payment_types(tenant_id, party_id, Some(supplier), None))
            .unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn set_payment_types_on_unknown_party_is_not_found() {
        let party = Party::empty(test_party_id());
        let err = party
            .handle(&set_payment_types(test_tenant_id(), test_party_id(), None, None))
            .unwrap_err();
        assert_eq!(err, DomainError::NotFound);
    }

    #[test]
    fn for_kind_maps_roles_to_defaults() {
        let supplier = test_payment_type(PaymentKind::Payable).id;
        let customer = test_payment_type(PaymentKind::Receivable).id;
        let defaults = PartyPaymentTypes {
            supplier: Some(supplier),
            customer: Some(customer),
        };

        assert_eq!(defaults.for_kind(PaymentKind::Payable), Some(supplier));
        assert_eq!(defaults.for_kind(PaymentKind::Receivable), Some(customer));
        assert_eq!(defaults.for_kind(PaymentKind::Both), None);
        assert!(defaults.references(customer));
    }

    #[test]
    fn suspend_party_prevents_transacting() {
        let (mut party, tenant_id, party_id) = registered(PartyKind::Supplier);
        assert!(party.can_transact());

        execute(
            &mut party,
            &PartyCommand::SuspendParty(SuspendParty {
                tenant_id,
                party_id,
                reason: Some("Risk review".to_string()),
                occurred_at: test_time(),
            }),
        )
        .unwrap();

        assert_eq!(party.status(), PartyStatus::Suspended);
        assert!(!party.can_transact());
    }

    #[test]
    fn update_details_keeps_payment_defaults() {
        let (mut party, tenant_id, party_id) = registered(PartyKind::Supplier);
        let supplier = test_payment_type(PaymentKind::Payable);
        execute(&mut party, &set_payment_types(tenant_id, party_id, Some(supplier), None)).unwrap();

        execute(
            &mut party,
            &PartyCommand::UpdateDetails(UpdateDetails {
                tenant_id,
                party_id,
                name: Some("Acme Industrial".to_string()),
                contact: None,
                occurred_at: test_time(),
            }),
        )
        .unwrap();

        assert_eq!(party.name(), "Acme Industrial");
        assert_eq!(party.supplier_payment_type(), Some(supplier.id));
    }
}
