//! Host to node commands.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use rangehost_primitives::{ClientId, Effect, Rgb};
use rangehost_training::{Difficulty, TrainingConfig, TrainingMode};

use crate::{CodecError, HEADER_LEN, Header, MessageType};

pub const BUZZER_MIN_FREQUENCY_HZ: u16 = 20;
pub const BUZZER_MAX_FREQUENCY_HZ: u16 = 20_000;
pub const BUZZER_MAX_DURATION_MS: u16 = 5_000;

/// Body byte of an `EFFECT_COMMAND` packet that stops a training session.
pub const TRAINING_STOP_SENTINEL: u8 = 0xFF;

const LED_LEN: usize = HEADER_LEN + 3;
const BUZZER_LEN: usize = HEADER_LEN + 4;
const EFFECT_LEN: usize = HEADER_LEN + 1;
const TRAINING_START_LEN: usize = HEADER_LEN + 11;

/// A command was rejected before it reached the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("buzzer frequency {0} Hz outside 20..=20000")]
    FrequencyOutOfRange(u16),
    #[error("buzzer duration {0} ms exceeds 5000")]
    DurationOutOfRange(u16),
}

/// The part of a [`TrainingConfig`] that travels to the node.
///
/// Target size and the mode-specific tuning stay on the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrainingStart {
    pub mode: TrainingMode,
    pub difficulty: Difficulty,
    pub duration: u16,
    pub target_count: u16,
    pub react_time: u16,
    pub sound_enabled: bool,
    pub stressors_enabled: bool,
    pub brightness: u8,
}

impl From<&TrainingConfig> for TrainingStart {
    fn from(config: &TrainingConfig) -> Self {
        Self {
            mode: config.mode,
            difficulty: config.difficulty,
            duration: config.duration,
            target_count: config.target_count,
            react_time: config.react_time,
            sound_enabled: config.sound_enabled,
            stressors_enabled: config.stressors_enabled,
            brightness: config.brightness,
        }
    }
}

impl TrainingStart {
    /// Rebuilds a config, taking the fields the wire does not carry from `base`.
    pub fn into_config(self, base: TrainingConfig) -> TrainingConfig {
        TrainingConfig {
            mode: self.mode,
            difficulty: self.difficulty,
            duration: self.duration,
            target_count: self.target_count,
            react_time: self.react_time,
            sound_enabled: self.sound_enabled,
            stressors_enabled: self.stressors_enabled,
            brightness: self.brightness,
            ..base
        }
    }
}

/// Outbound command. `target` may be [`ClientId::BROADCAST`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Led {
        target: ClientId,
        color: Rgb,
    },
    Buzzer {
        target: ClientId,
        frequency_hz: u16,
        duration_ms: u16,
    },
    Effect {
        target: ClientId,
        effect: Effect,
    },
    TrainingStart {
        target: ClientId,
        start: TrainingStart,
    },
    TrainingStop {
        target: ClientId,
    },
}

impl Command {
    /// Buzzer command with range-checked parameters.
    pub fn buzzer(
        target: ClientId,
        frequency_hz: u16,
        duration_ms: u16,
    ) -> Result<Self, CommandError> {
        let command = Self::Buzzer {
            target,
            frequency_hz,
            duration_ms,
        };
        command.validate()?;
        Ok(command)
    }

    pub fn training_start(target: ClientId, config: &TrainingConfig) -> Self {
        Self::TrainingStart {
            target,
            start: config.into(),
        }
    }

    pub fn target(&self) -> ClientId {
        match *self {
            Self::Led { target, .. }
            | Self::Buzzer { target, .. }
            | Self::Effect { target, .. }
            | Self::TrainingStart { target, .. }
            | Self::TrainingStop { target } => target,
        }
    }

    pub fn message_type(&self) -> MessageType {
        match self {
            Self::Led { .. } => MessageType::LedCommand,
            Self::Buzzer { .. } => MessageType::BuzzerCommand,
            Self::Effect { .. } | Self::TrainingStart { .. } | Self::TrainingStop { .. } => {
                MessageType::EffectCommand
            }
        }
    }

    pub fn encoded_len(&self) -> usize {
        match self {
            Self::Led { .. } => LED_LEN,
            Self::Buzzer { .. } => BUZZER_LEN,
            Self::Effect { .. } | Self::TrainingStop { .. } => EFFECT_LEN,
            Self::TrainingStart { .. } => TRAINING_START_LEN,
        }
    }

    pub fn validate(&self) -> Result<(), CommandError> {
        if let Self::Buzzer {
            frequency_hz,
            duration_ms,
            ..
        } = *self
        {
            if !(BUZZER_MIN_FREQUENCY_HZ..=BUZZER_MAX_FREQUENCY_HZ).contains(&frequency_hz) {
                return Err(CommandError::FrequencyOutOfRange(frequency_hz));
            }
            if duration_ms > BUZZER_MAX_DURATION_MS {
                return Err(CommandError::DurationOutOfRange(duration_ms));
            }
        }
        Ok(())
    }

    pub fn encode(&self) -> Result<Bytes, CommandError> {
        self.validate()?;

        let mut buf = BytesMut::with_capacity(self.encoded_len());
        buf.put_u8(self.message_type().as_u8());
        buf.put_u8(self.target().get());

        match *self {
            Self::Led { color, .. } => buf.put_slice(&color.to_array()),
            Self::Buzzer {
                frequency_hz,
                duration_ms,
                ..
            } => {
                buf.put_u16(frequency_hz);
                buf.put_u16(duration_ms);
            }
            Self::Effect { effect, .. } => buf.put_u8(effect.as_u8()),
            Self::TrainingStart { start, .. } => {
                buf.put_u8(start.mode.as_u8());
                buf.put_u8(start.difficulty.as_u8());
                buf.put_u16(start.duration);
                buf.put_u16(start.target_count);
                buf.put_u16(start.react_time);
                buf.put_u8(u8::from(start.sound_enabled));
                buf.put_u8(u8::from(start.stressors_enabled));
                buf.put_u8(start.brightness);
            }
            Self::TrainingStop { .. } => buf.put_u8(TRAINING_STOP_SENTINEL),
        }

        Ok(buf.freeze())
    }

    /// Decodes an outbound packet, as a node would.
    ///
    /// `EFFECT_COMMAND` packets are told apart by length: 13 bytes or more is
    /// a training start, otherwise the body byte is an effect id or the stop
    /// sentinel.
    pub fn decode(packet: &[u8]) -> Result<Self, CodecError> {
        let header = Header::parse(packet)?;
        let kind = header.message_type()?;
        let target = header.client_id;
        let actual = packet.len();
        let require = |expected: usize| {
            if actual < expected {
                Err(CodecError::Truncated {
                    kind,
                    expected,
                    actual,
                })
            } else {
                Ok(())
            }
        };
        let mut body = packet.get(HEADER_LEN..).unwrap_or_default();

        let command = match kind {
            MessageType::LedCommand => {
                require(LED_LEN)?;
                let color = Rgb::new(body.get_u8(), body.get_u8(), body.get_u8());
                Self::Led { target, color }
            }
            MessageType::BuzzerCommand => {
                require(BUZZER_LEN)?;
                let frequency_hz = body.get_u16();
                let duration_ms = body.get_u16();
                Self::buzzer(target, frequency_hz, duration_ms)?
            }
            MessageType::EffectCommand if actual >= TRAINING_START_LEN => {
                let start = TrainingStart {
                    mode: TrainingMode::try_from(body.get_u8())?,
                    difficulty: Difficulty::try_from(body.get_u8())?,
                    duration: body.get_u16(),
                    target_count: body.get_u16(),
                    react_time: body.get_u16(),
                    sound_enabled: body.get_u8() != 0,
                    stressors_enabled: body.get_u8() != 0,
                    brightness: body.get_u8(),
                };
                Self::TrainingStart { target, start }
            }
            MessageType::EffectCommand => {
                require(EFFECT_LEN)?;
                match body.get_u8() {
                    TRAINING_STOP_SENTINEL => Self::TrainingStop { target },
                    raw => Self::Effect {
                        target,
                        effect: Effect::from_repr(raw).ok_or(CodecError::UnknownEffect(raw))?,
                    },
                }
            }
            other => return Err(CodecError::NotACommand(other)),
        };

        Ok(command)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use proptest::prelude::*;

    use super::*;

    const CLIENT: ClientId = ClientId::new(3);

    #[test]
    fn test_led_layout() {
        let command = Command::Led {
            target: CLIENT,
            color: Rgb::new(255, 128, 0),
        };
        assert_eq!(command.encode().unwrap().as_ref(), &[0x02, 3, 255, 128, 0]);
    }

    #[test]
    fn test_buzzer_layout() {
        let command = Command::buzzer(ClientId::BROADCAST, 1000, 500).unwrap();
        assert_eq!(
            command.encode().unwrap().as_ref(),
            &[0x03, 0xFF, 0x03, 0xE8, 0x01, 0xF4]
        );
    }

    #[test]
    fn test_buzzer_range() {
        assert_eq!(
            Command::buzzer(CLIENT, 19, 100),
            Err(CommandError::FrequencyOutOfRange(19))
        );
        assert_eq!(
            Command::buzzer(CLIENT, 20_001, 100),
            Err(CommandError::FrequencyOutOfRange(20_001))
        );
        assert_eq!(
            Command::buzzer(CLIENT, 440, 5_001),
            Err(CommandError::DurationOutOfRange(5_001))
        );
        assert!(Command::buzzer(CLIENT, 20, 5_000).is_ok());

        let forged = Command::Buzzer {
            target: CLIENT,
            frequency_hz: 0,
            duration_ms: 0,
        };
        assert!(forged.encode().is_err());
    }

    #[test]
    fn test_effect_and_stop_layout() {
        let effect = Command::Effect {
            target: CLIENT,
            effect: Effect::Fire,
        };
        assert_eq!(effect.encode().unwrap().as_ref(), &[0x04, 3, 5]);

        let stop = Command::TrainingStop { target: CLIENT };
        assert_eq!(stop.encode().unwrap().as_ref(), &[0x04, 3, 0xFF]);
        assert_eq!(Command::decode(&[0x04, 3, 0xFF]).unwrap(), stop);
    }

    #[test]
    fn test_training_start_layout() {
        let config = TrainingConfig::new(TrainingMode::ColorCoded, Difficulty::Hard);
        let bytes = Command::training_start(CLIENT, &config).encode().unwrap();
        assert_eq!(
            bytes.as_ref(),
            &[
                0x04, 3, // header
                2, 2, // mode, difficulty
                0x00, 0xB4, // duration 180
                0x00, 0x14, // target count 20
                0x01, 0x5E, // react time 350
                1, 0, 255,
            ]
        );
    }

    #[test]
    fn test_decode_rejects_truncated() {
        assert_matches!(
            Command::decode(&[0x02, 3, 255, 0]),
            Err(CodecError::Truncated {
                kind: MessageType::LedCommand,
                expected: 5,
                actual: 4
            })
        );
        assert_matches!(
            Command::decode(&[0x04, 3]),
            Err(CodecError::Truncated { expected: 3, .. })
        );
        assert_matches!(Command::decode(&[0x03]), Err(CodecError::MissingHeader(1)));
    }

    #[test]
    fn test_decode_rejects_non_commands() {
        assert_matches!(
            Command::decode(&[0x05, 3, 0, 0, 0, 0]),
            Err(CodecError::NotACommand(MessageType::StatusRequest))
        );
        assert_matches!(
            Command::decode(&[0x04, 3, 0x20]),
            Err(CodecError::UnknownEffect(0x20))
        );
    }

    fn training_start() -> impl Strategy<Value = TrainingStart> {
        (
            (0u8..15, 0u8..3),
            any::<(u16, u16, u16)>(),
            any::<(bool, bool, u8)>(),
        )
            .prop_map(
                |(
                    (mode, difficulty),
                    (duration, target_count, react_time),
                    (sound_enabled, stressors_enabled, brightness),
                )| TrainingStart {
                    mode: TrainingMode::from_repr(mode).unwrap_or_default(),
                    difficulty: Difficulty::from_repr(difficulty).unwrap_or_default(),
                    duration,
                    target_count,
                    react_time,
                    sound_enabled,
                    stressors_enabled,
                    brightness,
                },
            )
    }

    proptest! {
        #[test]
        fn prop_training_start_round_trip(id in 0u8..0xFF, start in training_start(), target_size: u16) {
            let base = TrainingConfig { target_size, ..TrainingConfig::default() };
            let config = start.into_config(base);
            let command = Command::training_start(ClientId::new(id), &config);

            let decoded = Command::decode(&command.encode().unwrap()).unwrap();
            prop_assert_eq!(decoded, command);

            let Command::TrainingStart { start: decoded, .. } = decoded else {
                return Err(TestCaseError::fail("not a training start"));
            };
            prop_assert_eq!(decoded.into_config(base), config);
        }
    }
}
