use std::ops::Deref;

use once_cell::sync::Lazy;

use super::MessageCenter;

static DISTRIBUTED_CENTER: Lazy<DistributedMessageCenter> =
  Lazy::new(|| DistributedMessageCenter(MessageCenter::new()));

/// Second process-wide center with the same contract as [`MessageCenter`],
/// for traffic that should stay apart from the main bus.
///
/// Despite the name, delivery never leaves the process.
pub struct DistributedMessageCenter(MessageCenter);

impl DistributedMessageCenter {
  pub fn get() -> &'static DistributedMessageCenter { &DISTRIBUTED_CENTER }

  pub fn center(&self) -> &MessageCenter { &self.0 }
}

impl Deref for DistributedMessageCenter {
  type Target = MessageCenter;

  fn deref(&self) -> &MessageCenter { &self.0 }
}
