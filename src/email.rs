use lettre::{
    message::Mailbox,
    transport::smtp::authentication::Credentials,
    Message, SmtpTransport, Transport,
};

// Sends are best-effort: callers log failures and never roll back
// committed state because of one.
pub trait Mailer: Send + Sync {
    fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), String>;
}

pub struct ConsoleMailer;

impl Mailer for ConsoleMailer {
    fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), String> {
        log::info!("email (console) to={to} subject={subject:?} body={body:?}");
        Ok(())
    }
}

pub struct SmtpMailer {
    transport: SmtpTransport,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(host: &str, username: &str, password: &str, from: &str) -> Result<Self, String> {
        let from: Mailbox = from
            .parse()
            .map_err(|err| format!("invalid from address: {err}"))?;
        let transport = SmtpTransport::relay(host)
            .map_err(|err| format!("smtp relay setup failed: {err}"))?
            .credentials(Credentials::new(username.to_string(), password.to_string()))
            .build();
        Ok(SmtpMailer { transport, from })
    }
}

impl Mailer for SmtpMailer {
    fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), String> {
        let to: Mailbox = to
            .parse()
            .map_err(|err| format!("invalid recipient: {err}"))?;
        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .body(body.to_string())
            .map_err(|err| format!("message build failed: {err}"))?;
        self.transport
            .send(&message)
            .map(|_| ())
            .map_err(|err| format!("smtp send failed: {err}"))
    }
}

pub fn mailer_from_env() -> Box<dyn Mailer> {
    let vars = (
        std::env::var("SMTP_HOST"),
        std::env::var("SMTP_USER"),
        std::env::var("SMTP_PASS"),
        std::env::var("SMTP_FROM"),
    );
    if let (Ok(host), Ok(user), Ok(pass), Ok(from)) = vars {
        match SmtpMailer::new(&host, &user, &pass, &from) {
            Ok(mailer) => return Box::new(mailer),
            Err(err) => {
                log::warn!("SMTP configuration rejected ({err}); falling back to console mailer");
            }
        }
    }
    Box::new(ConsoleMailer)
}
