//! Hôte de démonstration de BlurGuard.
//!
//! Ouvre une fenêtre Winit qui tient lieu d'écran sensible. Perte de focus,
//! occlusion et suspension floutent l'écran ; au retour, si un code est
//! configuré, le challenge est posé dans le terminal.
//!
//! Usage :
//!   blurguard [--enable-passcode] [--biometrics] [--write-config]
//!
//! Exemples :
//!   cargo run                              → aucun code : le flou disparaît au retour
//!   cargo run -- --enable-passcode         → enregistre un code si aucun n'existe
//!   cargo run -- --enable-passcode --biometrics
//!                                          → biométrie d'abord, puis code (fallback)
//!   cargo run -- --write-config            → écrit la configuration effective

use std::env;
use std::error::Error;
use std::io::{self, BufRead};
use std::sync::Arc;
use std::thread;

use tracing::{error, info, warn};
use winit::application::ApplicationHandler;
use winit::dpi::{LogicalSize, PhysicalSize};
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, EventLoop, EventLoopProxy};
use winit::window::{Window, WindowId};

use blurguard::auth::{
    AuthenticationChallenger, AuthenticationOutcome, ChallengeRequest, ChallengeResponder,
    HostWaker,
};
use blurguard::blur::BoxBlur;
use blurguard::capture::{ScreenSize, Snapshot};
use blurguard::config::Config;
use blurguard::keychain::{AuthInfoStore, AuthenticationInfo, FileAuthStore};
use blurguard::lifecycle::{self, LifecycleEvent, LifecycleHub};
use blurguard::screen::GuardedScreen;
use blurguard::{BlurGuard, Collaborators};

fn main() -> Result<(), Box<dyn Error>> {
    // ── 1. Logging / Tracing ───────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // ── 2. Configuration et métadonnées ────────────────────────────────
    let config = Config::load();
    let args: Vec<String> = env::args().collect();
    if args.iter().any(|a| a == "--write-config") {
        let path = config.save()?;
        eprintln!("Configuration écrite ({})", path.display());
    }
    if args.iter().any(|a| a == "--enable-passcode") {
        let store = FileAuthStore::new(config.auth_store_path());
        if store.load()?.is_none() {
            store.save(&AuthenticationInfo {
                use_biometrics: args.iter().any(|a| a == "--biometrics"),
                ..AuthenticationInfo::with_passcode()
            })?;
            eprintln!("Code activé ({})", store.path().display());
        }
    }

    // ── 3. Boucle d'événements Winit ───────────────────────────────────
    let event_loop = EventLoop::with_user_event().build()?;
    let mut app = App::new(&event_loop, config);

    Ok(event_loop.run_app(&mut app)?)
}

// ─────────────────────────────────────────────────────────────────────────────
// Waker : pont challenge → Winit
// ─────────────────────────────────────────────────────────────────────────────

/// Marqueur envoyé à la boucle quand un résultat de challenge est en file.
#[derive(Debug)]
struct WakerEvent;

/// `Clone + Send + Sync` car `EventLoopProxy` l'est.
#[derive(Clone)]
struct Waker(EventLoopProxy<WakerEvent>);

impl HostWaker for Waker {
    fn wake(&self) {
        if let Err(error) = self.0.send_event(WakerEvent) {
            warn!(?error, "Échec du réveil de la boucle d'événements Winit");
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// DemoScreen : la fenêtre comme écran sensible
// ─────────────────────────────────────────────────────────────────────────────

struct DemoScreen {
    window: Window,
    title: String,
    page: Snapshot,
}

impl DemoScreen {
    fn new(window: Window, title: String) -> Self {
        let page = render_page(window.inner_size());
        Self {
            window,
            title,
            page,
        }
    }

    fn resize(&mut self, size: PhysicalSize<u32>) {
        self.page = render_page(size);
    }

    fn frame(&self) -> Option<Snapshot> {
        (!self.page.is_empty()).then(|| self.page.clone())
    }
}

impl GuardedScreen for DemoScreen {
    fn name(&self) -> &str {
        "saved-logins"
    }

    fn install_overlay(&mut self, image: &Snapshot) {
        self.window.set_title(&format!("{} — masqué", self.title));
        info!(width = image.width(), height = image.height(), "Overlay affiché");
    }

    fn remove_overlay(&mut self) {
        self.window.set_title(&self.title);
        info!("Overlay retiré");
    }

    fn pop_to_root(&mut self) {
        self.title = "BlurGuard — accueil".to_string();
        self.page = Snapshot::filled(self.page.size(), [255, 255, 255, 255]);
        info!("Retour à l'écran racine");
    }

    fn show_locked_out(&mut self) {
        self.window.set_title(&format!("{} — verrouillé", self.title));
        eprintln!("Écran verrouillé : revenez sur la fenêtre pour réessayer.");
    }
}

/// Fausse page d'identifiants : lignes sombres sur fond clair.
fn render_page(size: PhysicalSize<u32>) -> Snapshot {
    let size = ScreenSize::new(size.width, size.height);
    let mut page = Snapshot::filled(size, [250, 250, 250, 255]);
    let width = size.width as usize;
    for (i, px) in page.pixels_mut().iter_mut().enumerate() {
        let (x, y) = (i % width.max(1), i / width.max(1));
        if y % 32 < 12 && x % 400 < 320 {
            *px = [30, 30, 40, 255];
        }
    }
    page
}

// ─────────────────────────────────────────────────────────────────────────────
// TerminalChallenger : réponse au challenge depuis stdin
// ─────────────────────────────────────────────────────────────────────────────

struct TerminalChallenger;

impl AuthenticationChallenger for TerminalChallenger {
    fn challenge(&self, request: ChallengeRequest, responder: ChallengeResponder) {
        eprintln!(
            "[{}] {} — méthode {} : [o]ui / [a]nnuler / autre = méthode suivante",
            request.screen, request.reason, request.ticket.method
        );

        // La lecture bloque : hors du thread principal. Si le thread ne peut
        // pas démarrer, le responder est lâché et le guard reste verrouillé.
        let spawned = thread::Builder::new()
            .name("challenge-stdin".into())
            .spawn(move || {
                let mut line = String::new();
                let outcome = match io::stdin().lock().read_line(&mut line) {
                    Ok(0) | Err(_) => AuthenticationOutcome::Cancel,
                    Ok(_) => parse_answer(&line),
                };
                responder.respond(outcome);
            });
        if let Err(error) = spawned {
            warn!(%error, "Impossible de lire la réponse au challenge");
        }
    }
}

fn parse_answer(line: &str) -> AuthenticationOutcome {
    match line.trim().to_lowercase().as_str() {
        "o" | "oui" | "y" | "yes" => AuthenticationOutcome::Success,
        "a" | "annuler" | "c" | "cancel" => AuthenticationOutcome::Cancel,
        _ => AuthenticationOutcome::Fallback,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// App : enum deux phases
// ─────────────────────────────────────────────────────────────────────────────

enum App {
    /// Phase pré-initialisation : on attend que Winit appelle `resumed()`.
    Initial {
        proxy: EventLoopProxy<WakerEvent>,
        config: Config,
    },

    /// Phase opérationnelle : l'écran est gardé.
    Running {
        guard: BlurGuard<DemoScreen>,
        hub: LifecycleHub,
    },
}

impl App {
    fn new(event_loop: &EventLoop<WakerEvent>, config: Config) -> Self {
        Self::Initial {
            proxy: event_loop.create_proxy(),
            config,
        }
    }

    fn post(&mut self, event: LifecycleEvent) {
        if let Self::Running { guard, hub } = self {
            hub.post(event);
            guard.pump();
        }
    }
}

impl ApplicationHandler<WakerEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let (proxy, config) = match self {
            Self::Initial { proxy, config } => (proxy.clone(), config.clone()),
            Self::Running { .. } => {
                self.post(LifecycleEvent::WillEnterForeground);
                return;
            }
        };

        let window_attributes = Window::default_attributes()
            .with_title(config.window.title.clone())
            .with_inner_size(LogicalSize::new(config.window.width, config.window.height));
        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => window,
            Err(error) => {
                error!(%error, "Impossible de créer la fenêtre Winit");
                event_loop.exit();
                return;
            }
        };

        let screen = DemoScreen::new(window, config.window.title.clone());
        let collaborators = Collaborators {
            capture: Box::new(|screen: &DemoScreen| screen.frame()),
            filter: Box::new(BoxBlur),
            challenger: Box::new(TerminalChallenger),
            store: Box::new(FileAuthStore::new(config.auth_store_path())),
        };
        let mut guard = BlurGuard::new(screen, collaborators)
            .with_config(&config)
            .with_waker(Arc::new(Waker(proxy)));

        let hub = LifecycleHub::new();
        guard.attach(&hub);
        info!("Écran gardé, perdez le focus de la fenêtre pour le flouter");

        *self = Self::Running { guard, hub };
    }

    fn suspended(&mut self, _event_loop: &ActiveEventLoop) {
        self.post(LifecycleEvent::WillResignActive);
    }

    /// Un résultat de challenge attend dans la boîte aux lettres du guard.
    fn user_event(&mut self, _event_loop: &ActiveEventLoop, _event: WakerEvent) {
        if let Self::Running { guard, .. } = self {
            guard.pump();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => {
                if let Self::Running { guard, .. } = self {
                    guard.screen_mut().resize(size);
                }
            }
            ref other => {
                if let Some(lifecycle_event) = lifecycle::from_window_event(other) {
                    self.post(lifecycle_event);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_answer() {
        assert_eq!(parse_answer("o\n"), AuthenticationOutcome::Success);
        assert_eq!(parse_answer(" YES "), AuthenticationOutcome::Success);
        assert_eq!(parse_answer("a"), AuthenticationOutcome::Cancel);
        assert_eq!(parse_answer("cancel"), AuthenticationOutcome::Cancel);
        assert_eq!(parse_answer(""), AuthenticationOutcome::Fallback);
        assert_eq!(parse_answer("code"), AuthenticationOutcome::Fallback);
    }

    #[test]
    fn test_render_page_matches_size() {
        let page = render_page(PhysicalSize::new(64, 40));
        assert_eq!(page.width(), 64);
        assert_eq!(page.height(), 40);
        assert_eq!(page.pixel(0, 0), [30, 30, 40, 255]);
        assert_eq!(page.pixel(0, 20), [250, 250, 250, 255]);
    }

    #[test]
    fn test_render_page_zero_size_is_empty() {
        assert!(render_page(PhysicalSize::new(0, 0)).is_empty());
    }
}
