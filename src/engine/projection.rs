//! Role-based view projection.
//!
//! Privacy rules live here as explicit projection functions per entity
//! type rather than branching scattered through the handlers. A pull from
//! a non-master device receives filtered views: contact and guardian
//! fields on `Member` and contact fields on `NewMemberRegistration` are
//! nulled. The other entity types carry no sensitive fields and project
//! unchanged.
//!
//! The restore functions are the projection's inverse on apply: a device
//! that only ever saw the filtered view pushes nulls for fields it was
//! never given, and those must not erase the canonical values. `None` on
//! an incoming record over a stored value means withheld, not cleared.

use crate::models::{DeviceType, EntityBatch, Member, NewMemberRegistration};

/// The `Member` view for the given device role.
pub fn member_view(member: &Member, role: DeviceType) -> Member {
    if role.is_master() {
        return member.clone();
    }
    Member {
        email: None,
        phone: None,
        address: None,
        guardian_name: None,
        guardian_phone: None,
        ..member.clone()
    }
}

/// The `NewMemberRegistration` view for the given device role.
pub fn registration_view(
    registration: &NewMemberRegistration,
    role: DeviceType,
) -> NewMemberRegistration {
    if role.is_master() {
        return registration.clone();
    }
    NewMemberRegistration {
        email: None,
        phone: None,
        ..registration.clone()
    }
}

/// Projects a whole batch for the given device role.
pub fn batch_view(batch: EntityBatch, role: DeviceType) -> EntityBatch {
    if role.is_master() {
        return batch;
    }
    EntityBatch {
        member: batch.member.iter().map(|m| member_view(m, role)).collect(),
        new_member_registration: batch
            .new_member_registration
            .iter()
            .map(|r| registration_view(r, role))
            .collect(),
        ..batch
    }
}

/// Fills withheld `Member` fields back in from the stored record.
pub fn restore_member_fields(incoming: &mut Member, stored: &Member) {
    if incoming.email.is_none() {
        incoming.email = stored.email.clone();
    }
    if incoming.phone.is_none() {
        incoming.phone = stored.phone.clone();
    }
    if incoming.address.is_none() {
        incoming.address = stored.address.clone();
    }
    if incoming.guardian_name.is_none() {
        incoming.guardian_name = stored.guardian_name.clone();
    }
    if incoming.guardian_phone.is_none() {
        incoming.guardian_phone = stored.guardian_phone.clone();
    }
}

/// Fills withheld `NewMemberRegistration` fields back in from the stored
/// record.
pub fn restore_registration_fields(
    incoming: &mut NewMemberRegistration,
    stored: &NewMemberRegistration,
) {
    if incoming.email.is_none() {
        incoming.email = stored.email.clone();
    }
    if incoming.phone.is_none() {
        incoming.phone = stored.phone.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sensitive_member() -> Member {
        Member::new("Mina", "Park", "d1")
            .with_email("mina@example.com")
            .with_phone("555-0100")
            .with_guardian("Joon Park", "555-0101")
    }

    fn sensitive_registration() -> NewMemberRegistration {
        let mut registration = NewMemberRegistration::new("Sana", "Kim", "d1");
        registration.email = Some("sana@example.com".to_string());
        registration.phone = Some("555-0200".to_string());
        registration
    }

    #[test]
    fn test_non_master_view_strips_sensitive_fields() {
        let member = sensitive_member();

        for role in [
            DeviceType::MemberTablet,
            DeviceType::AdminTablet,
            DeviceType::Display,
        ] {
            let view = member_view(&member, role);
            assert!(view.email.is_none());
            assert!(view.phone.is_none());
            assert!(view.address.is_none());
            assert!(view.guardian_name.is_none());
            assert!(view.guardian_phone.is_none());
            // Non-sensitive fields and the envelope survive.
            assert_eq!(view.first_name, "Mina");
            assert_eq!(view.sync, member.sync);
        }
    }

    #[test]
    fn test_master_view_is_unfiltered() {
        let member = sensitive_member();
        let view = member_view(&member, DeviceType::Laptop);
        assert_eq!(view, member);
    }

    #[test]
    fn test_non_master_registration_view_strips_contact_fields() {
        let registration = sensitive_registration();

        for role in [
            DeviceType::MemberTablet,
            DeviceType::AdminTablet,
            DeviceType::Display,
        ] {
            let view = registration_view(&registration, role);
            assert!(view.email.is_none());
            assert!(view.phone.is_none());
            assert_eq!(view.first_name, "Sana");
            assert_eq!(view.approval_status, registration.approval_status);
            assert_eq!(view.sync, registration.sync);
        }

        let full = registration_view(&registration, DeviceType::Laptop);
        assert_eq!(full, registration);
    }

    #[test]
    fn test_batch_view_filters_members_and_registrations() {
        let member = sensitive_member();
        let registration = sensitive_registration();
        let check_in = crate::models::CheckIn::new(member.sync.id, "d1");
        let batch = EntityBatch {
            member: vec![member],
            new_member_registration: vec![registration],
            check_in: vec![check_in.clone()],
            ..Default::default()
        };

        let view = batch_view(batch, DeviceType::MemberTablet);

        assert!(view.member[0].email.is_none());
        assert!(view.new_member_registration[0].email.is_none());
        assert!(view.new_member_registration[0].phone.is_none());
        assert_eq!(view.check_in[0], check_in);
    }

    #[test]
    fn test_restore_keeps_stored_values_for_withheld_fields() {
        let stored = sensitive_member();
        let mut incoming = member_view(&stored, DeviceType::MemberTablet);
        incoming.belt_rank = Some("red".to_string());

        restore_member_fields(&mut incoming, &stored);

        assert_eq!(incoming.email, stored.email);
        assert_eq!(incoming.phone, stored.phone);
        assert_eq!(incoming.guardian_name, stored.guardian_name);
        assert_eq!(incoming.belt_rank.as_deref(), Some("red"));
    }

    #[test]
    fn test_restore_does_not_clobber_incoming_values() {
        let stored = sensitive_member();
        let mut incoming = stored.clone();
        incoming.email = Some("new@example.com".to_string());

        restore_member_fields(&mut incoming, &stored);

        assert_eq!(incoming.email.as_deref(), Some("new@example.com"));
    }
}
