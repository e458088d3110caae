use nr_core::UeIndex;

/// Completion notifications towards the upper MAC control procedures.
///
/// Kept narrow on purpose: one responsibility, trivially mockable in tests.
pub trait SchedNotifier: Send + Sync {
    /// UE creation or reconfiguration finished; `success == false` means the
    /// request was rejected and no scheduler state was left behind.
    fn on_ue_config_complete(&self, ue_index: UeIndex, success: bool);

    /// UE deletion finished; the UE index may be reused after this fires.
    fn on_ue_deletion_complete(&self, ue_index: UeIndex);
}

/// Notifier that drops all notifications, for tests and tooling
#[derive(Default)]
pub struct NullNotifier;

impl SchedNotifier for NullNotifier {
    fn on_ue_config_complete(&self, ue_index: UeIndex, success: bool) {
        tracing::trace!("on_ue_config_complete: {} success={}", ue_index, success);
    }

    fn on_ue_deletion_complete(&self, ue_index: UeIndex) {
        tracing::trace!("on_ue_deletion_complete: {}", ue_index);
    }
}
