//! Taxonomie d'erreurs de la synchronisation terrain
//!
//! Chaque action utilisateur attrape ces erreurs à sa frontière et les
//! transforme en message de statut ; aucune n'est rejouée automatiquement.

use thiserror::Error;

use crate::store::StoreError;

/// Erreurs des opérations de synchronisation
#[derive(Debug, Error)]
pub enum FieldSyncError {
    /// Échec réseau ou statut HTTP non-succès
    #[error("Transport error: {message}")]
    Transport {
        status: Option<u16>,
        message: String,
    },

    /// Corps de réponse mal formé
    #[error("Parse error: {0}")]
    Parse(String),

    /// Saisie invalide (premier contrôle en échec)
    #[error("Invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    /// Échec d'écriture ou de lecture locale
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    /// Le serveur signale explicitement un échec
    #[error("Server error: {0}")]
    ServerLogic(String),
}

impl FieldSyncError {
    /// Crée une erreur de transport sans statut HTTP
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            status: None,
            message: message.into(),
        }
    }

    /// Crée une erreur de transport pour un statut HTTP non-succès
    pub fn http_status(status: u16, body: &str) -> Self {
        let body = body.trim();
        let message = if body.is_empty() {
            format!("HTTP {}", status)
        } else {
            format!("HTTP {}: {}", status, body)
        };
        Self::Transport {
            status: Some(status),
            message,
        }
    }

    /// Crée une erreur de validation
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }

    /// Libellé court de la catégorie d'erreur
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport { .. } => "transport",
            Self::Parse(_) => "parse",
            Self::Validation { .. } => "validation",
            Self::Storage(_) => "storage",
            Self::ServerLogic(_) => "server",
        }
    }
}

impl From<reqwest::Error> for FieldSyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return Self::Parse(err.to_string());
        }
        Self::Transport {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

impl From<parcels::ParcelError> for FieldSyncError {
    fn from(err: parcels::ParcelError) -> Self {
        Self::Parse(err.to_string())
    }
}

impl From<serde_json::Error> for FieldSyncError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}
