/// Delay-slot sequencing state of the execution loop.
///
/// `InDelaySlot` is entered and left within a single step: a control transfer
/// executes its slot instruction inline before the transfer is committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum SlotState {
    /// Executing an ordinary instruction.
    #[default]
    Normal,
    /// Executing the slot instruction of a control transfer.
    InDelaySlot,
}

impl SlotState {
    /// Returns `true` inside a delay slot.
    #[must_use]
    pub const fn in_delay_slot(self) -> bool {
        matches!(self, Self::InDelaySlot)
    }
}

#[cfg(test)]
mod tests {
    use super::SlotState;

    #[test]
    fn default_is_normal() {
        assert_eq!(SlotState::default(), SlotState::Normal);
        assert!(!SlotState::Normal.in_delay_slot());
        assert!(SlotState::InDelaySlot.in_delay_slot());
    }
}
