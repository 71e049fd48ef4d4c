//! Member registry - the ordered participant list of a room
//!
//! The owner is always first; everyone else follows in join order.
//! Members are appended and never removed for the life of a room.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{DiningPreferences, Member};

/// Ordered member list, stored inside the room document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberRegistry {
    /// Owner at index 0, then join order
    members: Vec<Member>,
    /// Counter for generated `guest_<n>` ids
    next_guest: u32,
}

impl MemberRegistry {
    /// Create a registry holding only the owner
    pub fn new(owner: Member) -> Self {
        debug_assert!(owner.is_owner(), "registry must start with the owner");
        Self {
            members: vec![owner],
            next_guest: 1,
        }
    }

    /// Append a member, assigning `guest_<n>` when no id is supplied.
    ///
    /// Supplying the id of an existing member is a no-op that returns the
    /// stored record, so logged-in users can rejoin freely. The flag is
    /// `true` only when a member was actually appended.
    pub fn add_guest_member(
        &mut self,
        name: &str,
        preferences: DiningPreferences,
        id: Option<String>,
    ) -> Result<(Member, bool)> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::Validation("name is required".into()));
        }

        let id = match id {
            Some(id) => {
                if let Some(existing) = self.get_member_by_id(&id) {
                    tracing::debug!(member_id = %id, "Member already present, join is a no-op");
                    return Ok((existing.clone(), false));
                }
                id
            }
            None => self.next_guest_id(),
        };

        let member = Member::guest(id, name.to_string(), preferences);
        tracing::info!(member_id = %member.id, name = %member.name, "Member joined");
        self.members.push(member.clone());
        Ok((member, true))
    }

    fn next_guest_id(&mut self) -> String {
        loop {
            let candidate = format!("guest_{}", self.next_guest);
            self.next_guest += 1;
            if !self.contains(&candidate) {
                return candidate;
            }
        }
    }

    /// All members, owner first, then join order
    pub fn get_all_members(&self) -> &[Member] {
        &self.members
    }

    /// Look up a member by id
    pub fn get_member_by_id(&self, id: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.id == id)
    }

    /// Look up a member, failing with a not-found error
    pub fn require(&self, id: &str) -> Result<&Member> {
        self.get_member_by_id(id)
            .ok_or_else(|| Error::member_not_found(id))
    }

    pub fn owner(&self) -> Option<&Member> {
        self.members.first()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.members.iter().any(|m| m.id == id)
    }

    /// Member ids in enumeration order, used to fix a round's turn order
    pub fn ids(&self) -> Vec<String> {
        self.members.iter().map(|m| m.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Never true in practice; the owner is always present
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MemberType;

    fn prefs() -> DiningPreferences {
        DiningPreferences::new("SoHo", "$$").with_categories(["Italian"])
    }

    fn registry() -> MemberRegistry {
        MemberRegistry::new(Member::owner("Olivia".into(), prefs()))
    }

    #[test]
    fn test_owner_first_then_join_order() {
        let mut registry = registry();
        registry.add_guest_member("Gus", prefs(), None).unwrap();
        registry
            .add_guest_member("Uma", prefs(), Some("user_42".into()))
            .unwrap();
        registry.add_guest_member("Gia", prefs(), None).unwrap();

        let ids = registry.ids();
        assert_eq!(ids, vec!["owner", "guest_1", "user_42", "guest_2"]);
        assert_eq!(registry.owner().unwrap().member_type, MemberType::Host);
        assert_eq!(
            registry.get_member_by_id("guest_1").unwrap().member_type,
            MemberType::Guest
        );
    }

    #[test]
    fn test_rejoin_with_same_id_is_noop() {
        let mut registry = registry();
        let (first, added) = registry
            .add_guest_member("Uma", prefs(), Some("user_7".into()))
            .unwrap();
        assert!(added);
        let (again, added) = registry
            .add_guest_member("Uma Renamed", DiningPreferences::default(), Some("user_7".into()))
            .unwrap();

        assert!(!added);
        assert_eq!(registry.len(), 2);
        assert_eq!(again.name, first.name);
        assert_eq!(again.preferences, first.preferences);
    }

    #[test]
    fn test_generated_ids_skip_taken_ones() {
        let mut registry = registry();
        registry
            .add_guest_member("Early", prefs(), Some("guest_1".into()))
            .unwrap();
        let (generated, _) = registry.add_guest_member("Next", prefs(), None).unwrap();
        assert_eq!(generated.id, "guest_2");
    }

    #[test]
    fn test_unknown_member_is_not_found() {
        let registry = registry();
        assert!(registry.get_member_by_id("guest_9").is_none());
        assert!(matches!(
            registry.require("guest_9"),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_owner_id_and_blank_name() {
        let mut registry = registry();
        assert!(registry
            .add_guest_member("Mallory", prefs(), Some("owner".into()))
            .is_ok_and(|(m, added)| m.is_owner() && !added));
        assert_eq!(registry.len(), 1);
        assert!(matches!(
            registry.add_guest_member("   ", prefs(), None),
            Err(Error::Validation(_))
        ));
    }
}
