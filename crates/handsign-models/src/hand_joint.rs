//! Hand joint topology for the 21-point hand landmark layout.
//!
//! Landmark index and anatomical joint are tied together: the detector
//! reports points in this order and the classifier was trained on it.
//!
//! - 0: Wrist
//! - 1-4: Thumb (CMC, MCP, IP, tip)
//! - 5-8: Index finger (MCP, PIP, DIP, tip)
//! - 9-12: Middle finger
//! - 13-16: Ring finger
//! - 17-20: Pinky

/// Number of landmarks reported for one hand.
pub const HAND_LANDMARK_COUNT: usize = 21;

/// Anatomical joint addressed by a landmark index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandJoint {
    Wrist,
    ThumbCmc,
    ThumbMcp,
    ThumbIp,
    ThumbTip,
    IndexFingerMcp,
    IndexFingerPip,
    IndexFingerDip,
    IndexFingerTip,
    MiddleFingerMcp,
    MiddleFingerPip,
    MiddleFingerDip,
    MiddleFingerTip,
    RingFingerMcp,
    RingFingerPip,
    RingFingerDip,
    RingFingerTip,
    PinkyMcp,
    PinkyPip,
    PinkyDip,
    PinkyTip,
}

impl HandJoint {
    /// All joints in landmark order.
    pub const ALL: [HandJoint; HAND_LANDMARK_COUNT] = [
        HandJoint::Wrist,
        HandJoint::ThumbCmc,
        HandJoint::ThumbMcp,
        HandJoint::ThumbIp,
        HandJoint::ThumbTip,
        HandJoint::IndexFingerMcp,
        HandJoint::IndexFingerPip,
        HandJoint::IndexFingerDip,
        HandJoint::IndexFingerTip,
        HandJoint::MiddleFingerMcp,
        HandJoint::MiddleFingerPip,
        HandJoint::MiddleFingerDip,
        HandJoint::MiddleFingerTip,
        HandJoint::RingFingerMcp,
        HandJoint::RingFingerPip,
        HandJoint::RingFingerDip,
        HandJoint::RingFingerTip,
        HandJoint::PinkyMcp,
        HandJoint::PinkyPip,
        HandJoint::PinkyDip,
        HandJoint::PinkyTip,
    ];

    /// Landmark index of this joint.
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Returns the joint name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            HandJoint::Wrist => "wrist",
            HandJoint::ThumbCmc => "thumb_cmc",
            HandJoint::ThumbMcp => "thumb_mcp",
            HandJoint::ThumbIp => "thumb_ip",
            HandJoint::ThumbTip => "thumb_tip",
            HandJoint::IndexFingerMcp => "index_finger_mcp",
            HandJoint::IndexFingerPip => "index_finger_pip",
            HandJoint::IndexFingerDip => "index_finger_dip",
            HandJoint::IndexFingerTip => "index_finger_tip",
            HandJoint::MiddleFingerMcp => "middle_finger_mcp",
            HandJoint::MiddleFingerPip => "middle_finger_pip",
            HandJoint::MiddleFingerDip => "middle_finger_dip",
            HandJoint::MiddleFingerTip => "middle_finger_tip",
            HandJoint::RingFingerMcp => "ring_finger_mcp",
            HandJoint::RingFingerPip => "ring_finger_pip",
            HandJoint::RingFingerDip => "ring_finger_dip",
            HandJoint::RingFingerTip => "ring_finger_tip",
            HandJoint::PinkyMcp => "pinky_mcp",
            HandJoint::PinkyPip => "pinky_pip",
            HandJoint::PinkyDip => "pinky_dip",
            HandJoint::PinkyTip => "pinky_tip",
        }
    }
}
