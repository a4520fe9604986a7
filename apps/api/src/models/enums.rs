//! Closed string enums used by the plant aggregate.
//!
//! Labels outside the known set deserialize into `Unrecognized` instead of
//! failing the request body, so the validation engine can report them as
//! regular field errors next to every other problem in the payload.

macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($variant:ident => $label:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant,)+
            Unrecognized(String),
        }

        impl $name {
            pub const LABELS: &'static [&'static str] = &[$($label),+];

            pub fn as_str(&self) -> &str {
                match self {
                    $($name::$variant => $label,)+
                    $name::Unrecognized(raw) => raw.as_str(),
                }
            }

            pub fn is_recognized(&self) -> bool {
                !matches!(self, $name::Unrecognized(_))
            }

            /// True for the zero value (`""` or `null` on the wire).
            #[allow(dead_code)]
            pub fn is_blank(&self) -> bool {
                matches!(self, $name::Unrecognized(raw) if raw.trim().is_empty())
            }

            /// Accepted labels joined for error messages.
            pub fn allowed() -> String {
                Self::LABELS.join(", ")
            }
        }

        impl Default for $name {
            fn default() -> Self {
                $name::Unrecognized(String::new())
            }
        }

        impl From<String> for $name {
            fn from(raw: String) -> Self {
                match raw.as_str() {
                    $($label => $name::$variant,)+
                    _ => $name::Unrecognized(raw),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = Option::<String>::deserialize(deserializer)?;
                Ok(raw.map(Self::from).unwrap_or_default())
            }
        }
    };
}

string_enum! {
    pub enum Sunlight {
        FullSun => "Full Sun",
        IndirectSun => "Indirect Sun",
        PartialShade => "Partial Shade",
        PartialToFullShade => "Partial to Full Shade",
        FullShade => "Full Shade",
    }
}

string_enum! {
    pub enum WateringMethod {
        Top => "Top",
        Bottom => "Bottom",
        Soaking => "Soaking",
        SelfWatering => "Self",
        MistingOnly => "MistingOnly",
    }
}

string_enum! {
    pub enum WaterType {
        Tap => "Tap",
        Filtered => "Filtered",
        Rain => "Rain",
        Distilled => "Distilled",
        StaleTap => "StaleTap",
        LowLimestone => "LowLimestone",
    }
}

string_enum! {
    pub enum FertilizerType {
        Liquid => "Liquid",
        Sticks => "Sticks",
        Granulate => "Granulate",
        LongTerm => "LongTerm",
        Organic => "Organic",
        Hydroponic => "Hydroponic",
    }
}

string_enum! {
    pub enum PestType {
        SpiderMites => "Spider Mites",
        Aphids => "Aphids",
        Thrips => "Thrips",
        Mealybugs => "Mealybugs",
        Scale => "Scale",
        FungusGnats => "Fungus Gnats",
        RootRot => "Root Rot",
    }
}

string_enum! {
    pub enum PestStatus {
        Active => "Active",
        Treated => "Treated",
        Resolved => "Resolved",
    }
}

string_enum! {
    pub enum PlantFlag {
        NoDraught => "No Draught",
        RemoveBrownLeaves => "Remove Brown Leaves",
        HighHumidity => "High Humidity Required",
        SensitiveRoots => "Sensitive Roots",
    }
}

string_enum! {
    pub enum HealthStatus {
        Excellent => "Excellent",
        Good => "Good",
        Fair => "Fair",
        Poor => "Poor",
        Dormant => "Dormant",
    }
}
