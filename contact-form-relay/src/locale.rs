use std::str::FromStr;

/// Language of every human-readable string the service produces: validation messages, response
/// bodies and the composed emails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Locale {
    #[default]
    Es,
    En,
}

impl Locale {
    pub fn message_sent(&self) -> &'static str {
        match self {
            Locale::Es => "Mensaje enviado con éxito",
            Locale::En => "Message sent successfully",
        }
    }

    pub fn message_not_sent(&self) -> &'static str {
        match self {
            Locale::Es => "Error al enviar el mensaje",
            Locale::En => "Error sending the message",
        }
    }

    pub fn malformed_request(&self) -> &'static str {
        match self {
            Locale::Es => "El cuerpo de la petición no es un JSON válido",
            Locale::En => "The request body is not valid JSON",
        }
    }

    pub fn internal_error(&self) -> &'static str {
        match self {
            Locale::Es => "Error interno del servidor",
            Locale::En => "Internal server error",
        }
    }

    pub fn route_not_found(&self) -> &'static str {
        match self {
            Locale::Es => "Ruta no encontrada",
            Locale::En => "Route not found",
        }
    }

    pub fn api_running(&self) -> &'static str {
        match self {
            Locale::Es => "API funcionando correctamente",
            Locale::En => "API running",
        }
    }

    pub fn notification_subject(&self, name: &str) -> String {
        match self {
            Locale::Es => format!("Mensaje de {name}"),
            Locale::En => format!("Message from {name}"),
        }
    }

    pub fn confirmation_subject(&self) -> &'static str {
        match self {
            Locale::Es => "Hemos recibido tu mensaje",
            Locale::En => "We have received your message",
        }
    }
}

impl FromStr for Locale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "es" => Ok(Locale::Es),
            "en" => Ok(Locale::En),
            other => Err(format!("unsupported locale {other}, use `es` or `en`")),
        }
    }
}
