//! Contact sub-link snapshots
//!
//! When one endpoint of an edge is a contact, the edge carries a sub-link:
//! the specific name/address/phone/email/website in effect at link time. The
//! sub-link is a point-in-time snapshot copied by value, not a live
//! reference; later edits to the contact's canonical components do not
//! retroactively change what was recorded.

use serde::{Deserialize, Serialize};

use crate::ids::{
    AddressId, ContactId, EmailId, NameId, PhoneNumberId, RelationshipId, SubLinkId, WebsiteId,
};

// ============================================================================
// Contact (canonical record)
// ============================================================================

/// The canonical contact record, carrying the *current* component ids.
///
/// A contact may have many names, addresses and phone numbers over time;
/// this record points at whichever are current. Sub-links copy these ids at
/// link time and keep them even after the canonical record moves on.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Contact {
    pub id: ContactId,
    pub current_name_id: NameId,
    pub current_address_id: Option<AddressId>,
    pub current_phone_id: Option<PhoneNumberId>,
    pub current_email_id: Option<EmailId>,
    pub current_website_id: Option<WebsiteId>,
}

impl Contact {
    /// Create a contact with only a current name
    pub fn new(current_name_id: NameId) -> Self {
        Self {
            id: ContactId::new(),
            current_name_id,
            current_address_id: None,
            current_phone_id: None,
            current_email_id: None,
            current_website_id: None,
        }
    }

    /// Set the current address
    pub fn with_address(mut self, address_id: AddressId) -> Self {
        self.current_address_id = Some(address_id);
        self
    }

    /// Set the current phone number
    pub fn with_phone(mut self, phone_id: PhoneNumberId) -> Self {
        self.current_phone_id = Some(phone_id);
        self
    }

    /// Set the current email
    pub fn with_email(mut self, email_id: EmailId) -> Self {
        self.current_email_id = Some(email_id);
        self
    }

    /// Set the current website
    pub fn with_website(mut self, website_id: WebsiteId) -> Self {
        self.current_website_id = Some(website_id);
        self
    }

    /// Capture the contact's current component ids as a snapshot
    pub fn snapshot(&self) -> SubLinkSnapshot {
        SubLinkSnapshot {
            contact_id: self.id.clone(),
            name_id: self.current_name_id.clone(),
            contact_address_id: self.current_address_id.clone(),
            phone_number_id: self.current_phone_id.clone(),
            email_id: self.current_email_id.clone(),
            website_id: self.current_website_id.clone(),
        }
    }
}

// ============================================================================
// SubLinkSnapshot
// ============================================================================

/// The component ids recorded on a sub-link
///
/// Copied by value when an edge is created or migrated; immutable once
/// written except through the explicit update-sub-link operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubLinkSnapshot {
    pub contact_id: ContactId,
    pub name_id: NameId,
    pub contact_address_id: Option<AddressId>,
    pub phone_number_id: Option<PhoneNumberId>,
    pub email_id: Option<EmailId>,
    pub website_id: Option<WebsiteId>,
}

// ============================================================================
// ContactSubLink
// ============================================================================

/// A stored sub-link, owned by exactly one edge
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContactSubLink {
    pub id: SubLinkId,
    pub relationship_id: RelationshipId,
    pub snapshot: SubLinkSnapshot,
    pub created_by: String,
    /// Unix timestamp (milliseconds) when created
    pub date_created: i64,
    pub modified_by: Option<String>,
    /// Unix timestamp (milliseconds) of the last snapshot update
    pub last_modified: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_captures_current_ids() {
        let address = AddressId::new();
        let contact = Contact::new(NameId::from_string("name-1")).with_address(address.clone());

        let snap = contact.snapshot();
        assert_eq!(snap.contact_id, contact.id);
        assert_eq!(snap.name_id.as_str(), "name-1");
        assert_eq!(snap.contact_address_id, Some(address));
        assert!(snap.phone_number_id.is_none());
    }

    #[test]
    fn test_snapshot_is_detached_from_contact() {
        let mut contact = Contact::new(NameId::from_string("name-1"))
            .with_address(AddressId::from_string("addr-old"));
        let snap = contact.snapshot();

        // Moving the canonical record does not move the snapshot
        contact.current_address_id = Some(AddressId::from_string("addr-new"));
        assert_eq!(
            snap.contact_address_id.as_ref().map(|a| a.as_str()),
            Some("addr-old")
        );
    }
}
