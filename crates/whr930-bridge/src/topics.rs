//! Bus topic layout.

/// Default topic prefix.
pub const DEFAULT_PREFIX: &str = "house/2/attic/wtw";

pub const SET_VENTILATION_LEVEL: &str = "set_ventilation_level";
pub const OUTSIDE_AIR_TEMP: &str = "outside_air_temp";
pub const SUPPLY_AIR_TEMP: &str = "supply_air_temp";
pub const RETURN_AIR_TEMP: &str = "return_air_temp";
pub const EXHAUST_AIR_TEMP: &str = "exhaust_air_temp";
pub const VENTILATION_LEVEL: &str = "ventilation_level";

/// Full topic names under one prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    prefix: String,
}

impl Default for Topics {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}

impl Topics {
    /// Trailing slashes on `prefix` are ignored.
    pub fn new(prefix: impl Into<String>) -> Self {
        let mut prefix = prefix.into();
        while prefix.ends_with('/') {
            prefix.pop();
        }
        Self { prefix }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Topic the bridge subscribes to for level commands.
    pub fn set_ventilation_level(&self) -> String {
        self.topic(SET_VENTILATION_LEVEL)
    }

    pub fn outside_air_temp(&self) -> String {
        self.topic(OUTSIDE_AIR_TEMP)
    }

    pub fn supply_air_temp(&self) -> String {
        self.topic(SUPPLY_AIR_TEMP)
    }

    pub fn return_air_temp(&self) -> String {
        self.topic(RETURN_AIR_TEMP)
    }

    pub fn exhaust_air_temp(&self) -> String {
        self.topic(EXHAUST_AIR_TEMP)
    }

    pub fn ventilation_level(&self) -> String {
        self.topic(VENTILATION_LEVEL)
    }

    fn topic(&self, leaf: &str) -> String {
        if self.prefix.is_empty() {
            leaf.to_string()
        } else {
            format!("{}/{leaf}", self.prefix)
        }
    }
}

/// Temperature payload: one decimal, e.g. `21.5`.
pub fn format_temperature(celsius: f32) -> String {
    format!("{celsius:.1}")
}
