//! Area registry.
//!
//! An area is a logical unit of the organisation mapped 1:1 to a folder on the remote share.
//! The registry is a keyed collection of [`AreaDescriptor`]s persisted as a JSON document.
//! Until the first mutation nothing is persisted and the built-in default set is served.
//!
//! Mutations hold the registry's writer lock across the whole read-modify-write cycle, so
//! concurrent requests within the process never lose each other's updates.

use crate::constants::DEFAULT_AREA_ICON;
use crate::store;
use crate::{GatewayError, GatewayResult};
use share_types::{AreaId, NonEmptyText};
use std::fmt;
use std::path::PathBuf;
use tokio::sync::Mutex;

/// A registered area.
#[derive(Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AreaDescriptor {
    pub id: String,
    pub name: String,
    pub icon: String,
    pub folder: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_secret: Option<String>,
}

impl AreaDescriptor {
    fn builtin(id: &str, name: &str, icon: &str, folder: &str) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            icon: icon.into(),
            folder: folder.into(),
            credential_user: None,
            credential_secret: None,
        }
    }

    pub fn has_credentials(&self) -> bool {
        self.credential_user.is_some()
    }

    /// True iff the area carries credentials and both parts match.
    pub fn credentials_match(&self, user: &str, secret: &str) -> bool {
        match (&self.credential_user, &self.credential_secret) {
            (Some(u), Some(s)) => u == user && s == secret,
            (Some(u), None) => u == user && secret.is_empty(),
            _ => false,
        }
    }
}

impl fmt::Debug for AreaDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AreaDescriptor")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("icon", &self.icon)
            .field("folder", &self.folder)
            .field("credential_user", &self.credential_user)
            .field(
                "credential_secret",
                &self.credential_secret.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Input for creating an area.
#[derive(Clone, Debug, Default)]
pub struct NewArea {
    pub folder_name: String,
    pub display_name: String,
    pub icon: Option<String>,
    pub credential_user: Option<String>,
    pub credential_secret: Option<String>,
}

impl NewArea {
    /// Validates the request and derives the descriptor; the id is a slug of the folder name.
    pub fn into_descriptor(self) -> GatewayResult<AreaDescriptor> {
        let folder = NonEmptyText::new(&self.folder_name)
            .map_err(|_| GatewayError::InvalidInput("folderName is required".into()))?;
        let name = NonEmptyText::new(&self.display_name)
            .map_err(|_| GatewayError::InvalidInput("displayName is required".into()))?;
        crate::paths::split_segments(folder.as_str())?;
        let id = AreaId::from_folder_name(folder.as_str())?;

        let icon = self
            .icon
            .and_then(|i| NonEmptyText::new(i).ok())
            .map(NonEmptyText::into_string)
            .unwrap_or_else(|| DEFAULT_AREA_ICON.to_owned());

        Ok(AreaDescriptor {
            id: id.to_string(),
            name: name.into_string(),
            icon,
            folder: folder.into_string(),
            credential_user: self
                .credential_user
                .and_then(|u| NonEmptyText::new(u).ok())
                .map(NonEmptyText::into_string),
            credential_secret: self.credential_secret.filter(|s| !s.is_empty()),
        })
    }
}

/// Partial update of an existing area. `None` leaves a field unchanged.
#[derive(Clone, Debug, Default)]
pub struct AreaUpdate {
    pub name: Option<String>,
    pub icon: Option<String>,
    pub folder: Option<String>,
    pub credential_user: Option<String>,
    pub credential_secret: Option<String>,
}

/// Outcome of [`AreaRegistry::save_area`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AreaSaveOutcome {
    Created,
    AlreadyExists,
}

/// The persisted area registry.
#[derive(Debug)]
pub struct AreaRegistry {
    path: PathBuf,
    writer: Mutex<()>,
}

impl AreaRegistry {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            writer: Mutex::new(()),
        }
    }

    /// Returns the persisted registry, or the built-in default set if none exists yet.
    pub async fn get_areas(&self) -> GatewayResult<Vec<AreaDescriptor>> {
        Ok(store::read_list(&self.path)
            .await?
            .unwrap_or_else(default_areas))
    }

    pub async fn find(&self, id: &str) -> GatewayResult<Option<AreaDescriptor>> {
        Ok(self.get_areas().await?.into_iter().find(|a| a.id == id))
    }

    /// Physical folder for `id`, falling back to `id` itself for unregistered areas.
    pub async fn folder_for(&self, id: &str) -> GatewayResult<String> {
        Ok(self
            .find(id)
            .await?
            .map(|a| a.folder)
            .unwrap_or_else(|| id.to_owned()))
    }

    /// Appends `descriptor` iff no area shares its id.
    pub async fn save_area(&self, descriptor: AreaDescriptor) -> GatewayResult<AreaSaveOutcome> {
        let _guard = self.writer.lock().await;
        let mut areas = self.get_areas().await?;

        if areas.iter().any(|a| a.id == descriptor.id) {
            return Ok(AreaSaveOutcome::AlreadyExists);
        }

        areas.push(descriptor);
        store::write_list(&self.path, &areas).await?;
        Ok(AreaSaveOutcome::Created)
    }

    pub async fn update_area(&self, id: &str, update: AreaUpdate) -> GatewayResult<AreaDescriptor> {
        let _guard = self.writer.lock().await;
        let mut areas = self.get_areas().await?;

        let area = areas
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| GatewayError::AreaNotFound(id.to_owned()))?;

        if let Some(name) = update.name {
            area.name = NonEmptyText::new(name)
                .map_err(|_| GatewayError::InvalidInput("name cannot be empty".into()))?
                .into_string();
        }
        if let Some(icon) = update.icon {
            area.icon = NonEmptyText::new(icon)
                .map(NonEmptyText::into_string)
                .unwrap_or_else(|_| DEFAULT_AREA_ICON.to_owned());
        }
        if let Some(folder) = update.folder {
            let folder = NonEmptyText::new(folder)
                .map_err(|_| GatewayError::InvalidInput("folder cannot be empty".into()))?;
            crate::paths::split_segments(folder.as_str())?;
            area.folder = folder.into_string();
        }
        if let Some(user) = update.credential_user {
            area.credential_user = NonEmptyText::new(user).ok().map(NonEmptyText::into_string);
        }
        if let Some(secret) = update.credential_secret {
            area.credential_secret = Some(secret).filter(|s| !s.is_empty());
        }

        let updated = area.clone();
        store::write_list(&self.path, &areas).await?;
        Ok(updated)
    }

    pub async fn delete_area(&self, id: &str) -> GatewayResult<AreaDescriptor> {
        let _guard = self.writer.lock().await;
        let mut areas = self.get_areas().await?;

        let index = areas
            .iter()
            .position(|a| a.id == id)
            .ok_or_else(|| GatewayError::AreaNotFound(id.to_owned()))?;
        let removed = areas.remove(index);

        store::write_list(&self.path, &areas).await?;
        Ok(removed)
    }
}

/// The built-in area set served until a registry is persisted.
pub fn default_areas() -> Vec<AreaDescriptor> {
    vec![
        AreaDescriptor::builtin("tic", "Tecnologías de la Información y Comunicación", "💻", "tics"),
        AreaDescriptor::builtin("hidro", "Dirección de Información Hidrometeorológica", "🌧️", "direccion observacion hm"),
        AreaDescriptor::builtin("rrhh", "Dirección de Admin. de Recursos Humanos", "👥", "direccion talento humano"),
        AreaDescriptor::builtin("admin-fin", "Dirección Administrativa Financiera", "📊", "escaneados daf"),
        AreaDescriptor::builtin("ejecutiva", "Dirección Ejecutiva", "👔", "ejecutiva"),
        AreaDescriptor::builtin("juridica", "Dirección de Asesoría Jurídica", "⚖️", "juridica"),
        AreaDescriptor::builtin("com-social", "Dirección de Comunicación Social", "📢", "com-social"),
        AreaDescriptor::builtin("planificacion", "Dirección de Planificación", "📅", "direccion-de-informacion"),
        AreaDescriptor::builtin("pronosticos", "Dirección de Pronósticos y Alertas", "⚠️", "pronosticos"),
        AreaDescriptor::builtin("estudios", "Dirección de Estudios e Investigación", "🔬", "estudios"),
        AreaDescriptor::builtin("red-obs", "Red Nacional de Observación", "📡", "red-obs"),
        AreaDescriptor::builtin("calidad-agua", "Lab. Nacional Calidad de Agua", "💧", "calidad-agua"),
        AreaDescriptor::builtin("procesamiento", "Procesamiento de Modelos", "🖥️", "procesamiento_modelos"),
    ]
}
