use chrono::NaiveDate;
use serde_json::{json, Map, Value};

#[derive(Clone, Debug, PartialEq)]
pub enum ParamKind {
    Text,
    /// One of a fixed set of strings, matched case-insensitively.
    Choice(Vec<String>),
    Integer { min: i64, max: i64 },
    /// Calendar date in `YYYY-MM-DD` form.
    Date,
    /// Opaque key returned by an earlier tool: string or integer.
    Identifier,
}

#[derive(Clone, Debug)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
    pub required: bool,
    pub description: String,
}

#[derive(Clone, Debug, Default)]
pub struct InputSchema {
    params: Vec<ParamSpec>,
    /// Year, month and day fields that must form a real date together.
    calendar: Option<[String; 3]>,
}

impl InputSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(self, name: &str, kind: ParamKind, description: &str) -> Self {
        self.param(name, kind, true, description)
    }

    pub fn optional(self, name: &str, kind: ParamKind, description: &str) -> Self {
        self.param(name, kind, false, description)
    }

    /// Checks three integer fields together as one calendar date.
    pub fn calendar_date(mut self, year: &str, month: &str, day: &str) -> Self {
        self.calendar = Some([year.to_string(), month.to_string(), day.to_string()]);
        self
    }

    fn param(mut self, name: &str, kind: ParamKind, required: bool, description: &str) -> Self {
        self.params.push(ParamSpec {
            name: name.to_string(),
            kind,
            required,
            description: description.to_string(),
        });
        self
    }

    /// Checks `args` against the declared parameters. Undeclared fields are ignored.
    pub fn validate(&self, args: &Value) -> Result<(), String> {
        let empty = Map::new();
        let obj = match args {
            Value::Object(map) => map,
            Value::Null => &empty,
            other => return Err(format!("arguments must be a JSON object, got {}", type_name(other))),
        };

        for spec in &self.params {
            match obj.get(&spec.name) {
                None | Some(Value::Null) => {
                    if spec.required {
                        return Err(format!("missing required field `{}`", spec.name));
                    }
                }
                Some(value) => check_value(spec, value)?,
            }
        }
        if let Some([year, month, day]) = &self.calendar {
            let part = |key: &String| obj.get(key).and_then(Value::as_i64);
            if let (Some(y), Some(m), Some(d)) = (part(year), part(month), part(day)) {
                let date = i32::try_from(y)
                    .ok()
                    .zip(u32::try_from(m).ok())
                    .zip(u32::try_from(d).ok())
                    .and_then(|((y, m), d)| NaiveDate::from_ymd_opt(y, m, d));
                if date.is_none() {
                    return Err(format!("{}-{:02}-{:02} is not a calendar date", y, m, d));
                }
            }
        }
        Ok(())
    }

    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for spec in &self.params {
            let mut prop = json!({ "description": spec.description });
            match &spec.kind {
                ParamKind::Text | ParamKind::Date | ParamKind::Identifier => {
                    prop["type"] = json!("string");
                }
                ParamKind::Choice(options) => {
                    prop["type"] = json!("string");
                    prop["enum"] = json!(options);
                }
                ParamKind::Integer { min, max } => {
                    prop["type"] = json!("integer");
                    prop["minimum"] = json!(min);
                    prop["maximum"] = json!(max);
                }
            }
            properties.insert(spec.name.clone(), prop);
            if spec.required {
                required.push(spec.name.clone());
            }
        }
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

fn check_value(spec: &ParamSpec, value: &Value) -> Result<(), String> {
    let name = &spec.name;
    match &spec.kind {
        ParamKind::Text => match value.as_str() {
            Some(s) if !s.trim().is_empty() => Ok(()),
            Some(_) => Err(format!("field `{}` must not be empty", name)),
            None => Err(wrong_type(name, "string", value)),
        },
        ParamKind::Choice(options) => {
            let raw = value.as_str().ok_or_else(|| wrong_type(name, "string", value))?;
            if options.iter().any(|opt| opt.eq_ignore_ascii_case(raw.trim())) {
                Ok(())
            } else {
                Err(format!("field `{}` must be one of {:?}, got {:?}", name, options, raw))
            }
        }
        ParamKind::Integer { min, max } => {
            let n = value.as_i64().ok_or_else(|| wrong_type(name, "integer", value))?;
            if n < *min || n > *max {
                Err(format!("field `{}` must be between {} and {}, got {}", name, min, max, n))
            } else {
                Ok(())
            }
        }
        ParamKind::Date => {
            let raw = value.as_str().ok_or_else(|| wrong_type(name, "string", value))?;
            NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
                .map(|_| ())
                .map_err(|_| format!("field `{}` must be a YYYY-MM-DD date, got {:?}", name, raw))
        }
        ParamKind::Identifier => match value {
            Value::String(s) if !s.trim().is_empty() => Ok(()),
            Value::Number(n) if n.is_i64() || n.is_u64() => Ok(()),
            _ => Err(wrong_type(name, "string or integer identifier", value)),
        },
    }
}

fn wrong_type(name: &str, expected: &str, value: &Value) -> String {
    format!("field `{}` must be a {}, got {}", name, expected, type_name(value))
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
