use serde::Deserialize;
use session::command::ExternalCommand;
use session::effects::IdleReport;

/// Host-side input that would come from a real map and keyboard.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Input {
    Pointer {
        #[serde(default)]
        id: Option<String>,
    },
    Click {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        additive: bool,
    },
    Shift {
        held: bool,
    },
    Escape,
    /// Camera settled at `zoom`, optionally re-centred.
    Zoom {
        zoom: f64,
        #[serde(default)]
        lat: Option<f64>,
        #[serde(default)]
        lng: Option<f64>,
    },
    Horizon {
        horizon: u32,
    },
    Idle(IdleReport),
}

/// One stdin line: an external command or a simulated map input.
#[derive(Debug, Clone, PartialEq)]
pub enum Line {
    Command(ExternalCommand),
    Input(Input),
}

pub fn parse_line(line: &str) -> Result<Line, serde_json::Error> {
    if let Ok(command) = serde_json::from_str::<ExternalCommand>(line) {
        return Ok(Line::Command(command));
    }
    serde_json::from_str::<Input>(line).map(Line::Input)
}
