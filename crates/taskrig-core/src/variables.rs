// Typed task variables and the wire codec
//
// The engine exchanges variables as {value, type, valueInfo} triples. This
// module maps those onto a native sum type and back. Two rules govern the
// codec: constructing from an absent native value always yields Null, and
// structured data travels as serialized text inside a String variable.
// There is no native structured wire type on encode, only opaque
// passthrough on decode of unrecognized tags.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::Result;
use crate::protocol::{ValueInfoDto, VariableDto};

/// Type tags as they appear in the wire's `type` field
mod tags {
    pub const NULL: &str = "Null";
    pub const BOOLEAN: &str = "Boolean";
    pub const BYTES: &str = "Bytes";
    pub const SHORT: &str = "Short";
    pub const INTEGER: &str = "Integer";
    pub const LONG: &str = "Long";
    pub const DOUBLE: &str = "Double";
    pub const DATE: &str = "Date";
    pub const STRING: &str = "String";
    pub const FILE: &str = "File";
    pub const OBJECT: &str = "Object";
}

/// The engine's date wire format (millisecond precision, literal UTC suffix)
const ENGINE_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fUTC";

/// Additional, value-type-dependent metadata. Primarily used by File
/// variables (filename, mimetype, encoding) and serialized objects
/// (object type name, serialization format).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValueInfo {
    pub object_type_name: Option<String>,
    pub serialization_data_format: Option<String>,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
    pub encoding: Option<String>,
}

impl From<ValueInfoDto> for ValueInfo {
    fn from(dto: ValueInfoDto) -> Self {
        Self {
            object_type_name: dto.object_type_name,
            serialization_data_format: dto.serialization_data_format,
            file_name: dto.file_name,
            mime_type: dto.mime_type,
            encoding: dto.encoding,
        }
    }
}

impl From<ValueInfo> for ValueInfoDto {
    fn from(info: ValueInfo) -> Self {
        Self {
            object_type_name: info.object_type_name,
            serialization_data_format: info.serialization_data_format,
            file_name: info.file_name,
            mime_type: info.mime_type,
            encoding: info.encoding,
        }
    }
}

/// The native value of a task variable
#[derive(Debug, Clone, PartialEq)]
pub enum VariableValue {
    Null,
    Boolean(bool),
    Bytes(Vec<u8>),
    Short(i16),
    Integer(i32),
    Long(i64),
    Double(f64),
    Date(DateTime<Utc>),
    String(String),
    File(Vec<u8>),
    /// Engine-side serialized object, passed through opaquely.
    Object(Value),
    /// Any tag this client does not know; raw value and tag are preserved
    /// so reports can echo them back unchanged.
    Unsupported {
        value: Value,
        type_tag: Option<String>,
    },
}

/// A named, typed value attached to an external task
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub value: VariableValue,
    pub value_info: Option<ValueInfo>,
}

macro_rules! impl_from_native {
    ($native:ty, $variant:ident) => {
        impl From<$native> for Variable {
            fn from(value: $native) -> Self {
                Variable::of(VariableValue::$variant(value))
            }
        }

        impl From<Option<$native>> for Variable {
            fn from(value: Option<$native>) -> Self {
                match value {
                    Some(value) => Variable::from(value),
                    None => Variable::null(),
                }
            }
        }
    };
}

impl_from_native!(bool, Boolean);
impl_from_native!(Vec<u8>, Bytes);
impl_from_native!(i16, Short);
impl_from_native!(i32, Integer);
impl_from_native!(i64, Long);
impl_from_native!(f64, Double);
impl_from_native!(DateTime<Utc>, Date);
impl_from_native!(String, String);

impl From<&str> for Variable {
    fn from(value: &str) -> Self {
        Variable::of(VariableValue::String(value.to_owned()))
    }
}

impl From<Option<&str>> for Variable {
    fn from(value: Option<&str>) -> Self {
        match value {
            Some(value) => Variable::from(value),
            None => Variable::null(),
        }
    }
}

impl Variable {
    fn of(value: VariableValue) -> Self {
        Self {
            value,
            value_info: None,
        }
    }

    /// A variable with no value
    pub fn null() -> Self {
        Self::of(VariableValue::Null)
    }

    /// A File variable. Filename and mimetype are mandatory on the wire;
    /// encoding defaults to UTF-8.
    pub fn file(
        content: impl Into<Vec<u8>>,
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
        encoding: Option<String>,
    ) -> Self {
        Self {
            value: VariableValue::File(content.into()),
            value_info: Some(ValueInfo {
                file_name: Some(file_name.into()),
                mime_type: Some(mime_type.into()),
                encoding: Some(encoding.unwrap_or_else(|| "UTF-8".to_owned())),
                ..ValueInfo::default()
            }),
        }
    }

    /// Serialize any value to JSON text and wrap it as a String variable.
    /// This is how structured data (records, arrays) travels to the engine.
    pub fn from_json<T: Serialize>(value: &T) -> Result<Self> {
        Ok(Self::of(VariableValue::String(serde_json::to_string(
            value,
        )?)))
    }

    /// Attach value metadata
    pub fn with_value_info(mut self, value_info: ValueInfo) -> Self {
        self.value_info = Some(value_info);
        self
    }

    pub fn is_null(&self) -> bool {
        matches!(self.value, VariableValue::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match &self.value {
            VariableValue::Boolean(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match &self.value {
            VariableValue::Bytes(value) | VariableValue::File(value) => Some(value),
            _ => None,
        }
    }

    /// Lenient numeric accessor: narrower and wider integer variants and
    /// numeric strings are accepted when they fit.
    pub fn as_short(&self) -> Option<i16> {
        match &self.value {
            VariableValue::Short(value) => Some(*value),
            VariableValue::Integer(value) => i16::try_from(*value).ok(),
            VariableValue::Long(value) => i16::try_from(*value).ok(),
            VariableValue::String(value) => value.parse().ok(),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i32> {
        match &self.value {
            VariableValue::Short(value) => Some(i32::from(*value)),
            VariableValue::Integer(value) => Some(*value),
            VariableValue::Long(value) => i32::try_from(*value).ok(),
            VariableValue::String(value) => value.parse().ok(),
            _ => None,
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match &self.value {
            VariableValue::Short(value) => Some(i64::from(*value)),
            VariableValue::Integer(value) => Some(i64::from(*value)),
            VariableValue::Long(value) => Some(*value),
            VariableValue::String(value) => value.parse().ok(),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match &self.value {
            VariableValue::Short(value) => Some(f64::from(*value)),
            VariableValue::Integer(value) => Some(f64::from(*value)),
            VariableValue::Long(value) => Some(*value as f64),
            VariableValue::Double(value) => Some(*value),
            VariableValue::String(value) => value.parse().ok(),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match &self.value {
            VariableValue::Date(value) => Some(*value),
            VariableValue::String(value) => parse_engine_date(value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.value {
            VariableValue::String(value) => Some(value),
            _ => None,
        }
    }

    /// File metadata, when present. Fetched File variables decode to a Null
    /// value, so this inspects the metadata rather than the value.
    pub fn file_info(&self) -> Option<&ValueInfo> {
        self.value_info
            .as_ref()
            .filter(|info| info.file_name.is_some())
    }

    /// Deserialize a String variable's JSON text. `Ok(None)` when the
    /// variable carries no text.
    pub fn to_json<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        match self.as_str() {
            Some(text) => Ok(Some(serde_json::from_str(text)?)),
            None => Ok(None),
        }
    }

    /// Decode a wire triple into a native variable. An absent value decodes
    /// to Null regardless of the declared type; unknown tags pass through.
    pub fn from_dto(dto: &VariableDto) -> Self {
        let value_info = dto.value_info.clone().map(ValueInfo::from);
        let value = match dto.type_tag.as_deref() {
            Some(tags::NULL) => VariableValue::Null,
            // file content is not delivered inline; only the metadata survives
            Some(tags::FILE) => VariableValue::Null,
            Some(tags::BOOLEAN) => dto
                .value
                .as_ref()
                .and_then(Value::as_bool)
                .map(VariableValue::Boolean)
                .unwrap_or(VariableValue::Null),
            Some(tags::BYTES) => json_base64(dto.value.as_ref())
                .map(VariableValue::Bytes)
                .unwrap_or(VariableValue::Null),
            Some(tags::SHORT) => json_i64(dto.value.as_ref())
                .and_then(|value| i16::try_from(value).ok())
                .map(VariableValue::Short)
                .unwrap_or(VariableValue::Null),
            Some(tags::INTEGER) => json_i64(dto.value.as_ref())
                .and_then(|value| i32::try_from(value).ok())
                .map(VariableValue::Integer)
                .unwrap_or(VariableValue::Null),
            Some(tags::LONG) => json_i64(dto.value.as_ref())
                .map(VariableValue::Long)
                .unwrap_or(VariableValue::Null),
            Some(tags::DOUBLE) => json_f64(dto.value.as_ref())
                .map(VariableValue::Double)
                .unwrap_or(VariableValue::Null),
            Some(tags::DATE) => dto
                .value
                .as_ref()
                .and_then(Value::as_str)
                .and_then(parse_engine_date)
                .map(VariableValue::Date)
                .unwrap_or(VariableValue::Null),
            Some(tags::STRING) => dto
                .value
                .as_ref()
                .and_then(Value::as_str)
                .map(|value| VariableValue::String(value.to_owned()))
                .unwrap_or(VariableValue::Null),
            Some(tags::OBJECT) => dto
                .value
                .clone()
                .map(VariableValue::Object)
                .unwrap_or(VariableValue::Null),
            tag => VariableValue::Unsupported {
                value: dto.value.clone().unwrap_or(Value::Null),
                type_tag: tag.map(str::to_owned),
            },
        };

        Self { value, value_info }
    }

    /// Encode a native variable into its wire triple
    pub fn to_dto(&self) -> VariableDto {
        let value_info = self.value_info.clone().map(ValueInfoDto::from);

        let (value, type_tag) = match &self.value {
            VariableValue::Null => (None, Some(tags::NULL.to_owned())),
            VariableValue::Boolean(value) => {
                (Some(Value::Bool(*value)), Some(tags::BOOLEAN.to_owned()))
            }
            VariableValue::Bytes(value) => (
                Some(Value::String(BASE64.encode(value))),
                Some(tags::BYTES.to_owned()),
            ),
            VariableValue::Short(value) => {
                (Some(Value::from(*value)), Some(tags::SHORT.to_owned()))
            }
            VariableValue::Integer(value) => {
                (Some(Value::from(*value)), Some(tags::INTEGER.to_owned()))
            }
            VariableValue::Long(value) => (Some(Value::from(*value)), Some(tags::LONG.to_owned())),
            VariableValue::Double(value) => {
                (Some(Value::from(*value)), Some(tags::DOUBLE.to_owned()))
            }
            VariableValue::Date(value) => (
                Some(Value::String(format_engine_date(value))),
                Some(tags::DATE.to_owned()),
            ),
            VariableValue::String(value) => (
                Some(Value::String(value.clone())),
                Some(tags::STRING.to_owned()),
            ),
            VariableValue::File(value) => (
                Some(Value::String(BASE64.encode(value))),
                Some(tags::FILE.to_owned()),
            ),
            VariableValue::Object(value) => {
                (Some(value.clone()), Some(tags::OBJECT.to_owned()))
            }
            VariableValue::Unsupported { value, type_tag } => {
                (Some(value.clone()), type_tag.clone())
            }
        };

        VariableDto {
            value,
            type_tag,
            value_info,
        }
    }
}

fn format_engine_date(value: &DateTime<Utc>) -> String {
    value.format(ENGINE_DATE_FORMAT).to_string()
}

/// Parse the engine's date formats: RFC 3339, the engine's numeric-offset
/// form, and this client's own literal-UTC form.
fn parse_engine_date(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = DateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.3f%z") {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(text, ENGINE_DATE_FORMAT) {
        return Some(parsed.and_utc());
    }
    None
}

fn json_i64(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.parse().ok(),
        _ => None,
    }
}

fn json_f64(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.parse().ok(),
        _ => None,
    }
}

fn json_base64(value: Option<&Value>) -> Option<Vec<u8>> {
    value?.as_str().and_then(|text| BASE64.decode(text).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde::Deserialize;
    use serde_json::json;

    fn round_trip(variable: Variable) -> Variable {
        Variable::from_dto(&variable.to_dto())
    }

    #[test]
    fn absent_native_values_become_null() {
        assert!(Variable::from(None::<bool>).is_null());
        assert!(Variable::from(None::<i16>).is_null());
        assert!(Variable::from(None::<i64>).is_null());
        assert!(Variable::from(None::<f64>).is_null());
        assert!(Variable::from(None::<String>).is_null());
        assert!(Variable::from(None::<Vec<u8>>).is_null());
        assert!(Variable::from(None::<DateTime<Utc>>).is_null());
    }

    #[test]
    fn boolean_round_trip() {
        assert_eq!(round_trip(Variable::from(true)).as_bool(), Some(true));
    }

    #[test]
    fn integer_round_trip() {
        assert_eq!(
            round_trip(Variable::from(i32::MAX)).as_integer(),
            Some(i32::MAX)
        );
    }

    #[test]
    fn long_round_trip() {
        assert_eq!(round_trip(Variable::from(i64::MAX)).as_long(), Some(i64::MAX));
    }

    #[test]
    fn double_round_trip() {
        assert_eq!(round_trip(Variable::from(13.37_f64)).as_double(), Some(13.37));
    }

    #[test]
    fn string_round_trip() {
        assert_eq!(round_trip(Variable::from("<root/>")).as_str(), Some("<root/>"));
    }

    #[test]
    fn bytes_round_trip_through_base64() {
        let bytes = b"bytes".to_vec();
        let dto = Variable::from(bytes.clone()).to_dto();
        assert_eq!(dto.value, Some(json!("Ynl0ZXM=")));
        assert_eq!(Variable::from_dto(&dto).as_bytes(), Some(bytes.as_slice()));
    }

    #[test]
    fn date_round_trip_at_millisecond_precision() {
        let date = Utc.with_ymd_and_hms(2024, 1, 23, 13, 42, 42).unwrap()
            + chrono::Duration::milliseconds(125);
        let dto = Variable::from(date).to_dto();
        assert_eq!(dto.value, Some(json!("2024-01-23T13:42:42.125UTC")));
        assert_eq!(Variable::from_dto(&dto).as_date(), Some(date));
    }

    #[test]
    fn decodes_engine_offset_dates() {
        let dto = VariableDto {
            value: Some(json!("2013-01-23T13:42:42.000+0200")),
            type_tag: Some("Date".into()),
            value_info: None,
        };
        let expected = Utc.with_ymd_and_hms(2013, 1, 23, 11, 42, 42).unwrap();
        assert_eq!(Variable::from_dto(&dto).as_date(), Some(expected));
    }

    #[test]
    fn absent_wire_value_decodes_to_null_regardless_of_declared_type() {
        for tag in ["Boolean", "Integer", "Long", "Double", "Date", "String", "Bytes"] {
            let dto = VariableDto {
                value: None,
                type_tag: Some(tag.into()),
                value_info: None,
            };
            assert!(Variable::from_dto(&dto).is_null(), "tag {tag}");
        }
    }

    #[test]
    fn file_decodes_to_null_but_keeps_metadata() {
        let dto = VariableDto {
            value: None,
            type_tag: Some("File".into()),
            value_info: Some(ValueInfoDto {
                file_name: Some("invoice.pdf".into()),
                mime_type: Some("application/pdf".into()),
                encoding: Some("UTF-8".into()),
                ..ValueInfoDto::default()
            }),
        };

        let variable = Variable::from_dto(&dto);
        assert!(variable.is_null());
        let info = variable.file_info().unwrap();
        assert_eq!(info.file_name.as_deref(), Some("invoice.pdf"));
    }

    #[test]
    fn file_encode_carries_mandatory_metadata() {
        let dto = Variable::file(b"%PDF".to_vec(), "invoice.pdf", "application/pdf", None).to_dto();
        assert_eq!(dto.type_tag.as_deref(), Some("File"));
        let info = dto.value_info.unwrap();
        assert_eq!(info.file_name.as_deref(), Some("invoice.pdf"));
        assert_eq!(info.mime_type.as_deref(), Some("application/pdf"));
        assert_eq!(info.encoding.as_deref(), Some("UTF-8"));
    }

    #[test]
    fn unknown_tag_passes_through_unchanged() {
        let dto = VariableDto {
            value: Some(json!({"nested": true})),
            type_tag: Some("Json".into()),
            value_info: None,
        };

        let variable = Variable::from_dto(&dto);
        assert!(matches!(
            &variable.value,
            VariableValue::Unsupported { type_tag: Some(tag), .. } if tag == "Json"
        ));

        let echoed = variable.to_dto();
        assert_eq!(echoed.value, Some(json!({"nested": true})));
        assert_eq!(echoed.type_tag.as_deref(), Some("Json"));
    }

    #[test]
    fn numeric_accessors_parse_numeric_strings() {
        let variable = Variable::from("42");
        assert_eq!(variable.as_short(), Some(42));
        assert_eq!(variable.as_integer(), Some(42));
        assert_eq!(variable.as_long(), Some(42));
        assert_eq!(variable.as_double(), Some(42.0));
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Order {
        number: u32,
    }

    #[test]
    fn structured_values_travel_as_string_variables() {
        let variable = Variable::from_json(&Order { number: 7 }).unwrap();
        assert_eq!(variable.to_dto().type_tag.as_deref(), Some("String"));

        let parsed: Option<Order> = round_trip(variable).to_json().unwrap();
        assert_eq!(parsed, Some(Order { number: 7 }));
    }
}
