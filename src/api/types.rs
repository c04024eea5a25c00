use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Role assigned to backend users.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
  #[serde(rename = "id_rol")]
  pub id: i64,
  #[serde(rename = "nombre_rol")]
  pub name: String,
  /// Fields this client does not interpret, kept for round trips
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

/// Property listed by the brokerage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
  #[serde(rename = "id_propiedad")]
  pub id: i64,
  #[serde(rename = "titulo_propiedad")]
  pub title: String,
  #[serde(rename = "estado_propiedad", default)]
  pub status: Option<String>,
  #[serde(rename = "tipo_operacion_propiedad", default)]
  pub operation: Option<String>,
  #[serde(rename = "ci_propietario", default)]
  pub owner_ci: Option<String>,
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

/// Property owner, keyed by national id (CI).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Owner {
  #[serde(rename = "ci_propietario")]
  pub ci: String,
  #[serde(rename = "nombres_completo_propietario", default)]
  pub first_names: Option<String>,
  #[serde(rename = "apellidos_completo_propietario", default)]
  pub last_names: Option<String>,
  #[serde(rename = "correo_electronico_propietario", default)]
  pub email: Option<String>,
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

impl Owner {
  /// Case-insensitive match on CI, names and email.
  pub fn matches(&self, term: &str) -> bool {
    let term = term.to_lowercase();
    let fields = [
      Some(self.ci.as_str()),
      self.first_names.as_deref(),
      self.last_names.as_deref(),
      self.email.as_deref(),
    ];
    fields
      .into_iter()
      .flatten()
      .any(|field| field.to_lowercase().contains(&term))
  }

  pub fn full_name(&self) -> String {
    match (&self.first_names, &self.last_names) {
      (Some(first), Some(last)) => format!("{} {}", first, last),
      (Some(first), None) => first.clone(),
      (None, Some(last)) => last.clone(),
      (None, None) => self.ci.clone(),
    }
  }
}

/// Query parameters for a filtered listing, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filters {
  pairs: Vec<(String, String)>,
}

impl Filters {
  pub fn new() -> Self {
    Self::default()
  }

  /// Add a parameter. Empty values are skipped, like unset form fields.
  pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    let value = value.into();
    if !value.is_empty() {
      self.pairs.push((key.into(), value));
    }
    self
  }

  /// Add a parameter only when a value is present.
  pub fn with_opt(self, key: impl Into<String>, value: Option<impl Into<String>>) -> Self {
    match value {
      Some(v) => self.with(key, v),
      None => self,
    }
  }

  /// Pagination window.
  pub fn page(self, skip: u32, limit: u32) -> Self {
    self.with("skip", skip.to_string()).with("limit", limit.to_string())
  }

  /// Parse a `key=value` argument.
  pub fn parse_pair(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
      Some((key, value)) if !key.trim().is_empty() => {
        Ok((key.trim().to_string(), value.trim().to_string()))
      }
      _ => Err(format!("expected key=value, got '{}'", raw)),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.pairs.is_empty()
  }

  pub fn as_pairs(&self) -> &[(String, String)] {
    &self.pairs
  }
}

impl FromIterator<(String, String)> for Filters {
  fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
    iter
      .into_iter()
      .fold(Filters::new(), |filters, (k, v)| filters.with(k, v))
  }
}

/// Filters accepted by the property listing.
#[derive(Debug, Clone, Default)]
pub struct PropertyFilter {
  pub operation: Option<String>,
  pub status: Option<String>,
  pub owner_ci: Option<String>,
}

impl From<&PropertyFilter> for Filters {
  fn from(f: &PropertyFilter) -> Self {
    Filters::new()
      .with_opt("tipo_operacion", f.operation.clone())
      .with_opt("estado", f.status.clone())
      .with_opt("ci_propietario", f.owner_ci.clone())
  }
}

/// Filters accepted by the appointment listing.
#[derive(Debug, Clone, Default)]
pub struct AppointmentFilter {
  pub status: Option<String>,
  pub property_id: Option<i64>,
  pub client_ci: Option<String>,
  pub agent_user_id: Option<i64>,
  pub from_date: Option<String>,
  pub to_date: Option<String>,
}

impl From<&AppointmentFilter> for Filters {
  fn from(f: &AppointmentFilter) -> Self {
    Filters::new()
      .with_opt("estado", f.status.clone())
      .with_opt("id_propiedad", f.property_id.map(|id| id.to_string()))
      .with_opt("ci_cliente", f.client_ci.clone())
      .with_opt("id_usuario_asesor", f.agent_user_id.map(|id| id.to_string()))
      .with_opt("fecha_desde", f.from_date.clone())
      .with_opt("fecha_hasta", f.to_date.clone())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_property_keeps_unknown_fields() {
    let raw = json!({
      "id_propiedad": 4,
      "titulo_propiedad": "Casa en Equipetrol",
      "estado_propiedad": "disponible",
      "precio_publicado_propiedad": 125000.0,
      "superficie_propiedad": 320
    });

    let property: Property = serde_json::from_value(raw.clone()).unwrap();
    assert_eq!(property.id, 4);
    assert_eq!(property.status.as_deref(), Some("disponible"));
    assert_eq!(property.operation, None);
    assert_eq!(property.extra.get("superficie_propiedad"), Some(&json!(320)));

    let back = serde_json::to_value(&property).unwrap();
    assert_eq!(back["precio_publicado_propiedad"], json!(125000.0));
    assert_eq!(back["titulo_propiedad"], json!("Casa en Equipetrol"));
  }

  #[test]
  fn test_owner_matches() {
    let owner: Owner = serde_json::from_value(json!({
      "ci_propietario": "4587123",
      "nombres_completo_propietario": "María José",
      "apellidos_completo_propietario": "Rojas Vaca",
      "correo_electronico_propietario": "mjrojas@example.com"
    }))
    .unwrap();

    assert!(owner.matches("4587"));
    assert!(owner.matches("maría"));
    assert!(owner.matches("ROJAS"));
    assert!(owner.matches("example.com"));
    assert!(!owner.matches("pereira"));
    assert_eq!(owner.full_name(), "María José Rojas Vaca");
  }

  #[test]
  fn test_filters_skip_empty_values() {
    let filters = Filters::new().with("estado", "").with("tipo_operacion", "venta");
    assert_eq!(
      filters.as_pairs(),
      &[("tipo_operacion".to_string(), "venta".to_string())]
    );
  }

  #[test]
  fn test_property_filter_to_query() {
    let filter = PropertyFilter {
      operation: Some("alquiler".into()),
      status: None,
      owner_ci: Some("123".into()),
    };
    let filters = Filters::from(&filter);
    assert_eq!(
      filters.as_pairs(),
      &[
        ("tipo_operacion".to_string(), "alquiler".to_string()),
        ("ci_propietario".to_string(), "123".to_string()),
      ]
    );
  }

  #[test]
  fn test_appointment_filter_to_query() {
    let filter = AppointmentFilter {
      status: Some("pendiente".into()),
      agent_user_id: Some(9),
      ..Default::default()
    };
    let filters = Filters::from(&filter);
    assert_eq!(
      filters.as_pairs(),
      &[
        ("estado".to_string(), "pendiente".to_string()),
        ("id_usuario_asesor".to_string(), "9".to_string()),
      ]
    );
  }

  #[test]
  fn test_parse_pair() {
    assert_eq!(
      Filters::parse_pair("estado=pendiente"),
      Ok(("estado".to_string(), "pendiente".to_string()))
    );
    assert!(Filters::parse_pair("estado").is_err());
    assert!(Filters::parse_pair("=x").is_err());
  }

  #[test]
  fn test_page() {
    let filters = Filters::new().page(20, 10);
    assert_eq!(
      filters.as_pairs(),
      &[
        ("skip".to_string(), "20".to_string()),
        ("limit".to_string(), "10".to_string()),
      ]
    );
  }
}
