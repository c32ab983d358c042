//! Accessory identity

/// Reference to an attached accessory device
///
/// The accessory reports a model string and a serial string. The serial
/// carries the tunnel address the peer expects this side to use; the
/// session configuration reads it back as an address literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessoryDescriptor {
    /// Model string reported by the accessory
    pub model: String,
    /// Serial string reported by the accessory
    pub serial: String,
}

impl AccessoryDescriptor {
    /// Create a new accessory descriptor
    pub fn new(model: impl Into<String>, serial: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            serial: serial.into(),
        }
    }
}

impl std::fmt::Display for AccessoryDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.model, self.serial)
    }
}
