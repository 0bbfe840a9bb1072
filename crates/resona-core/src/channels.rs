//! Channel masks and bus layouts.
//!
//! A [`ChannelMask`] is an immutable bitmask of up to 64 channel-presence
//! bits — the mask value is the sole identity, so two masks with equal bits
//! are equal no matter how they were built. An [`AudioBus`] is a named,
//! directional holder for a channel layout that can be disabled and later
//! re-enabled to its last active layout.

#[cfg(not(feature = "std"))]
use alloc::string::String;

/// Immutable set of enabled channels, stored as a 64-bit presence mask.
///
/// Bit `i` set means channel `i` is present. Construction paths are
/// irrelevant: equality and hashing go through the raw mask alone.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct ChannelMask(u64);

impl ChannelMask {
    /// Maximum number of addressable channels.
    pub const MAX_CHANNELS: u32 = 64;

    /// The empty mask — no channels enabled.
    pub const DISABLED: Self = Self(0);

    /// Mono layout (channel 0).
    pub const MONO: Self = Self(0b1);

    /// Stereo layout (channels 0 and 1).
    pub const STEREO: Self = Self(0b11);

    /// Creates a mask from a raw 64-bit presence word.
    #[inline]
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Creates a mask with the first `count` channels enabled.
    ///
    /// `count` is clamped to [`MAX_CHANNELS`](Self::MAX_CHANNELS).
    pub const fn from_count(count: u32) -> Self {
        if count >= Self::MAX_CHANNELS {
            Self(u64::MAX)
        } else {
            Self((1u64 << count) - 1)
        }
    }

    /// Returns the raw presence bits.
    #[inline]
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Number of enabled channels (population count).
    #[inline]
    pub const fn count(self) -> u32 {
        self.0.count_ones()
    }

    /// Returns true if no channel is enabled.
    #[inline]
    pub const fn is_disabled(self) -> bool {
        self.0 == 0
    }

    /// Returns true if channel `index` is enabled.
    #[inline]
    pub const fn contains(self, index: u32) -> bool {
        index < Self::MAX_CHANNELS && (self.0 >> index) & 1 == 1
    }

    /// Returns this mask with channel `index` enabled.
    #[inline]
    pub const fn with(self, index: u32) -> Self {
        if index < Self::MAX_CHANNELS {
            Self(self.0 | (1u64 << index))
        } else {
            self
        }
    }

    /// Returns this mask with channel `index` disabled.
    #[inline]
    pub const fn without(self, index: u32) -> Self {
        if index < Self::MAX_CHANNELS {
            Self(self.0 & !(1u64 << index))
        } else {
            self
        }
    }

    /// Iterates over the indices of enabled channels, ascending.
    pub fn iter(self) -> impl Iterator<Item = u32> {
        (0..Self::MAX_CHANNELS).filter(move |&i| self.contains(i))
    }
}

/// Direction of an [`AudioBus`] relative to its owning node or device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BusDirection {
    /// The bus carries audio into its owner.
    Input,
    /// The bus carries audio out of its owner.
    Output,
}

/// Named, directional channel-layout holder.
///
/// A bus remembers three layouts: the default it was declared with, the
/// layout it last had while enabled, and the current layout (which may be
/// [`ChannelMask::DISABLED`]). Disabling then re-enabling restores the last
/// enabled layout, falling back to the default when the bus was never
/// active. Only bus-layout negotiation mutates a bus.
#[derive(Clone, Debug)]
pub struct AudioBus {
    name: String,
    direction: BusDirection,
    default_layout: ChannelMask,
    last_enabled: ChannelMask,
    current: ChannelMask,
}

impl AudioBus {
    /// Creates an enabled bus with the given name, direction, and default layout.
    pub fn new(name: impl Into<String>, direction: BusDirection, default_layout: ChannelMask) -> Self {
        Self {
            name: name.into(),
            direction,
            default_layout,
            last_enabled: default_layout,
            current: default_layout,
        }
    }

    /// Returns the bus name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the bus direction.
    pub fn direction(&self) -> BusDirection {
        self.direction
    }

    /// Returns the layout the bus was declared with.
    pub fn default_layout(&self) -> ChannelMask {
        self.default_layout
    }

    /// Returns the current layout (disabled when the bus is off).
    pub fn current(&self) -> ChannelMask {
        self.current
    }

    /// Returns true if the bus currently carries any channels.
    pub fn is_enabled(&self) -> bool {
        !self.current.is_disabled()
    }

    /// Sets the current layout.
    ///
    /// A non-disabled layout also becomes the new last-enabled layout;
    /// setting [`ChannelMask::DISABLED`] behaves like [`disable`](Self::disable).
    pub fn set_layout(&mut self, layout: ChannelMask) {
        if layout.is_disabled() {
            self.disable();
        } else {
            self.last_enabled = layout;
            self.current = layout;
        }
    }

    /// Disables the bus, remembering the active layout for re-enabling.
    pub fn disable(&mut self) {
        if self.is_enabled() {
            self.last_enabled = self.current;
        }
        self.current = ChannelMask::DISABLED;
    }

    /// Re-enables the bus with its last enabled layout.
    ///
    /// Falls back to the default layout if the bus has never been enabled.
    pub fn enable(&mut self) {
        if !self.is_enabled() {
            self.current = if self.last_enabled.is_disabled() {
                self.default_layout
            } else {
                self.last_enabled
            };
        }
    }
}
