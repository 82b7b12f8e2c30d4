use std::fmt;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::{
    domain::{ProfileId, UserId},
    error::ProfileError,
};

/// Role assigned to self-registered accounts.
pub const DEFAULT_ROLE_ID: i64 = 2;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// The service has returned `userId` both as a number and as a decimal string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireId {
    Number(i64),
    Text(String),
}

impl WireId {
    pub fn to_user_id(&self) -> Option<UserId> {
        match self {
            Self::Number(raw) => Some(UserId(*raw)),
            Self::Text(raw) => raw.parse().ok(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub user_id: Option<WireId>,
}

impl LoginResponse {
    /// Both a non-empty token and a parseable user id, or nothing.
    pub fn credentials(&self) -> Option<(String, UserId)> {
        let token = self.token.as_deref().filter(|t| !t.trim().is_empty())?;
        let user_id = self.user_id.as_ref()?.to_user_id()?;
        Some((token.to_string(), user_id))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub contrasena: String,
    pub id_rol: i64,
    pub esta_activo: bool,
}

impl RegisterRequest {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            contrasena: password.into(),
            id_rol: DEFAULT_ROLE_ID,
            esta_activo: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProfileField {
    NombreCompleto,
    Telefono,
    DocumentoIdentidad,
    FechaNacimiento,
    Genero,
    Biografia,
    Ciudad,
    Pais,
    FotoPerfil,
}

impl ProfileField {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NombreCompleto => "nombreCompleto",
            Self::Telefono => "telefono",
            Self::DocumentoIdentidad => "documentoIdentidad",
            Self::FechaNacimiento => "fechaNacimiento",
            Self::Genero => "genero",
            Self::Biografia => "biografia",
            Self::Ciudad => "ciudad",
            Self::Pais => "pais",
            Self::FotoPerfil => "fotoPerfil",
        }
    }

    pub fn is_required(self) -> bool {
        !matches!(self, Self::Biografia | Self::FotoPerfil)
    }
}

impl fmt::Display for ProfileField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDraft {
    pub nombre_completo: String,
    pub telefono: String,
    pub documento_identidad: String,
    pub fecha_nacimiento: String,
    pub genero: String,
    pub biografia: String,
    pub ciudad: String,
    pub pais: String,
    pub foto_perfil: String,
}

impl ProfileDraft {
    /// Empty form with the birth date preset to now.
    pub fn blank() -> Self {
        Self {
            fecha_nacimiento: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            ..Self::default()
        }
    }

    fn fields(&self) -> [(ProfileField, &str); 9] {
        [
            (ProfileField::NombreCompleto, &self.nombre_completo),
            (ProfileField::Telefono, &self.telefono),
            (ProfileField::DocumentoIdentidad, &self.documento_identidad),
            (ProfileField::FechaNacimiento, &self.fecha_nacimiento),
            (ProfileField::Genero, &self.genero),
            (ProfileField::Biografia, &self.biografia),
            (ProfileField::Ciudad, &self.ciudad),
            (ProfileField::Pais, &self.pais),
            (ProfileField::FotoPerfil, &self.foto_perfil),
        ]
    }

    /// Fails on the first required field that is empty or whitespace.
    pub fn validate(&self) -> Result<(), ProfileError> {
        match self
            .fields()
            .into_iter()
            .find(|(field, value)| field.is_required() && value.trim().is_empty())
        {
            Some((field, _)) => Err(ProfileError::ValidationFailed(field)),
            None => Ok(()),
        }
    }

    pub fn set(&mut self, field: ProfileField, value: impl Into<String>) {
        let value = value.into();
        match field {
            ProfileField::NombreCompleto => self.nombre_completo = value,
            ProfileField::Telefono => self.telefono = value,
            ProfileField::DocumentoIdentidad => self.documento_identidad = value,
            ProfileField::FechaNacimiento => self.fecha_nacimiento = value,
            ProfileField::Genero => self.genero = value,
            ProfileField::Biografia => self.biografia = value,
            ProfileField::Ciudad => self.ciudad = value,
            ProfileField::Pais => self.pais = value,
            ProfileField::FotoPerfil => self.foto_perfil = value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRef {
    pub id: UserId,
}

/// Body of `POST /perfiles`: the draft plus the owning user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateProfileRequest {
    #[serde(flatten)]
    pub draft: ProfileDraft,
    pub usuario: UserRef,
}

impl CreateProfileRequest {
    pub fn new(draft: ProfileDraft, user_id: UserId) -> Self {
        Self {
            draft,
            usuario: UserRef { id: user_id },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileOwner {
    pub id: Option<UserId>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Profile {
    pub id: Option<ProfileId>,
    #[serde(deserialize_with = "null_as_empty")]
    pub nombre_completo: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub telefono: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub documento_identidad: String,
    pub fecha_nacimiento: Option<String>,
    #[serde(deserialize_with = "null_as_empty")]
    pub genero: String,
    pub biografia: Option<String>,
    #[serde(deserialize_with = "null_as_empty")]
    pub ciudad: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub pais: String,
    pub foto_perfil: Option<String>,
    pub usuario: Option<ProfileOwner>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProfileSummary {
    pub id: Option<ProfileId>,
    #[serde(deserialize_with = "null_as_empty")]
    pub nombre_completo: String,
    pub foto_perfil: Option<String>,
    pub ciudad: Option<String>,
    pub pais: Option<String>,
}

/// The service sends `null` for text columns it never filled in.
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Option::unwrap_or_default)
}
