//! Caller-facing status text for dispatched commands.

use crate::command::{LampAction, LampPayload};

/// Reply for a lamp command that was handed to the lamp queue.
pub fn lamp_reply(lamp: &LampPayload) -> String {
    let room = &lamp.room;
    match (&lamp.action, lamp.color.as_deref(), lamp.intensity.as_deref()) {
        (LampAction::SetColor, Some(color), _) if !color.is_empty() => {
            format!("lamp in {} changed color to {}", room, color)
        }
        (LampAction::SetIntensity, _, Some(intensity)) if !intensity.is_empty() => {
            format!("lamp in {} intensity set to {}%", room, intensity)
        }
        (LampAction::TurnOn, _, _) => format!("lamp in {} turned on", room),
        (LampAction::TurnOff, _, _) => format!("lamp in {} turned off", room),
        (action, _, _) => format!(
            "command {} for the lamp in {} sent successfully",
            action, room
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lamp(action: LampAction, color: Option<&str>, intensity: Option<&str>) -> LampPayload {
        LampPayload {
            action,
            room: "kitchen".to_string(),
            color: color.map(str::to_string),
            intensity: intensity.map(str::to_string),
        }
    }

    #[test]
    fn color_change_names_room_and_color() {
        let msg = lamp_reply(&lamp(LampAction::SetColor, Some("blue"), None));
        assert_eq!(msg, "lamp in kitchen changed color to blue");
    }

    #[test]
    fn intensity_change_is_a_percentage() {
        let msg = lamp_reply(&lamp(LampAction::SetIntensity, None, Some("40")));
        assert_eq!(msg, "lamp in kitchen intensity set to 40%");
    }

    #[test]
    fn on_and_off() {
        assert_eq!(
            lamp_reply(&lamp(LampAction::TurnOn, None, None)),
            "lamp in kitchen turned on"
        );
        assert_eq!(
            lamp_reply(&lamp(LampAction::TurnOff, None, None)),
            "lamp in kitchen turned off"
        );
    }

    #[test]
    fn set_color_without_color_is_generic() {
        let msg = lamp_reply(&lamp(LampAction::SetColor, None, None));
        assert_eq!(msg, "command set_color for the lamp in kitchen sent successfully");
    }

    #[test]
    fn other_actions_are_generic() {
        let msg = lamp_reply(&lamp(LampAction::Other("blink".to_string()), None, None));
        assert_eq!(msg, "command blink for the lamp in kitchen sent successfully");
    }
}
