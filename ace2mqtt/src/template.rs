use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use minijinja::value::{Object, ObjectRepr, Value};
use minijinja::Environment;

/// Renders a Jinja template with `vars`.
///
/// Names without a matching variable render as their own placeholder, so
/// Home Assistant's templates (`{{ value_json.x }}`) survive rendering.
pub(crate) fn render(
    template: &str,
    vars: &HashMap<&str, String>,
) -> Result<String, minijinja::Error> {
    let mut env = Environment::new();
    env.set_keep_trailing_newline(true);

    let context = Variables(
        vars.iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect(),
    );
    env.render_str(template, Value::from_object(context))
}

#[derive(Debug)]
struct Variables(HashMap<String, String>);

impl Object for Variables {
    fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
        let name = key.as_str()?;
        Some(match self.0.get(name) {
            Some(value) => Value::from(value.as_str()),
            None => Value::from_object(Placeholder(name.to_string())),
        })
    }
}

// An undefined name, or a lookup on one, printed back as `{{ path }}`.
#[derive(Debug)]
struct Placeholder(String);

impl Object for Placeholder {
    fn repr(self: &Arc<Self>) -> ObjectRepr {
        ObjectRepr::Plain
    }

    fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
        let path = match key.as_str() {
            Some(attr) => format!("{}.{attr}", self.0),
            None => format!("{}[{key}]", self.0),
        };
        Some(Value::from_object(Placeholder(path)))
    }

    fn render(self: &Arc<Self>, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{{ {} }}}}", self.0)
    }
}
