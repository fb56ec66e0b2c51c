use std::{fmt, str::FromStr};

use serde::{de::DeserializeOwned, Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(EntityId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Driver,
    Race,
    Team,
}

impl EntityKind {
    pub const ALL: [EntityKind; 3] = [EntityKind::Driver, EntityKind::Race, EntityKind::Team];

    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Driver => "driver",
            EntityKind::Race => "race",
            EntityKind::Team => "team",
        }
    }

    /// Path segment of the kind's collection under `/api`.
    pub fn collection(self) -> &'static str {
        match self {
            EntityKind::Driver => "drivers",
            EntityKind::Race => "races",
            EntityKind::Team => "teams",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownEntityKind(pub String);

impl fmt::Display for UnknownEntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown entity kind '{}'", self.0)
    }
}

impl std::error::Error for UnknownEntityKind {}

impl FromStr for EntityKind {
    type Err = UnknownEntityKind;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_lowercase();
        EntityKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized || kind.collection() == normalized)
            .ok_or(UnknownEntityKind(raw.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Text,
    Number,
}

/// One entry of an entity's form schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub field_type: FieldType,
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(i64),
    Text(String),
}

impl FieldValue {
    /// Empty text (after trimming) and zero both count as "not filled in".
    pub fn is_blank(&self) -> bool {
        match self {
            FieldValue::Text(text) => text.trim().is_empty(),
            FieldValue::Number(number) => *number == 0,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(text) => f.write_str(text),
            FieldValue::Number(number) => write!(f, "{number}"),
        }
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Number(value)
    }
}

/// Coerces a form value into a concrete field type. Form inputs deliver text
/// even for numeric fields, so numbers are parsed and fall back to zero.
pub trait FromFieldValue {
    fn from_field_value(value: FieldValue) -> Self;
}

impl FromFieldValue for String {
    fn from_field_value(value: FieldValue) -> Self {
        match value {
            FieldValue::Text(text) => text,
            FieldValue::Number(number) => number.to_string(),
        }
    }
}

impl FromFieldValue for i64 {
    fn from_field_value(value: FieldValue) -> Self {
        match value {
            FieldValue::Number(number) => number,
            FieldValue::Text(text) => text.trim().parse().unwrap_or_default(),
        }
    }
}

pub trait EntitySchema:
    Clone + Default + PartialEq + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    const KIND: EntityKind;
    const FIELDS: &'static [FieldSpec];

    fn id(&self) -> Option<EntityId>;
    fn set_id(&mut self, id: Option<EntityId>);
    fn field(&self, name: &str) -> Option<FieldValue>;
    /// Returns `false` when `name` is not part of the schema.
    fn set_field(&mut self, name: &str, value: FieldValue) -> bool;

    fn missing_fields(&self) -> Vec<&'static FieldSpec> {
        Self::FIELDS
            .iter()
            .filter(|spec| spec.required)
            .filter(|spec| self.field(spec.name).map_or(true, |value| value.is_blank()))
            .collect()
    }

    fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }
}

macro_rules! field_ty {
    (Text) => {
        String
    };
    (Number) => {
        i64
    };
}

macro_rules! entity_schema {
    (
        $(#[$meta:meta])*
        $name:ident => $kind:ident {
            $($field:ident: $ty:ident = $wire:literal, $label:literal;)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(rename_all = "camelCase")]
        pub struct $name {
            #[serde(default)]
            pub id: Option<EntityId>,
            $(
                #[serde(default)]
                pub $field: field_ty!($ty),
            )+
        }

        impl EntitySchema for $name {
            const KIND: EntityKind = EntityKind::$kind;
            const FIELDS: &'static [FieldSpec] = &[
                $(FieldSpec {
                    name: $wire,
                    label: $label,
                    field_type: FieldType::$ty,
                    required: true,
                },)+
            ];

            fn id(&self) -> Option<EntityId> {
                self.id
            }

            fn set_id(&mut self, id: Option<EntityId>) {
                self.id = id;
            }

            fn field(&self, name: &str) -> Option<FieldValue> {
                match name {
                    $($wire => Some(FieldValue::from(self.$field.clone())),)+
                    _ => None,
                }
            }

            fn set_field(&mut self, name: &str, value: FieldValue) -> bool {
                match name {
                    $($wire => {
                        self.$field = FromFieldValue::from_field_value(value);
                        true
                    })+
                    _ => false,
                }
            }
        }
    };
}

entity_schema! {
    /// `image` holds a data URL produced from the uploaded picture.
    Driver => Driver {
        name: Text = "name", "Name";
        age: Number = "age", "Age";
        nationality: Text = "nationality", "Nationality";
        image: Text = "image", "Image";
    }
}

entity_schema! {
    Race => Race {
        winner_name: Text = "winnerName", "Winner Name";
        winner_time: Text = "winnerTime", "Winner Time";
        grand_prix: Text = "grandPrix", "Grand Prix";
        number_of_laps: Number = "numberOfLaps", "Number of Laps";
    }
}

entity_schema! {
    /// `driver1` and `driver2` are free-text driver names; nothing checks them
    /// against the driver collection.
    Team => Team {
        manufacturer: Text = "manufacturer", "Manufacturer";
        image: Text = "image", "Image";
        driver1: Text = "driver1", "Driver 1";
        driver2: Text = "driver2", "Driver 2";
    }
}
