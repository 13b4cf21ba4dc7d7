//! HASS-Display feeder firmware: main entry point
//!
//! Hexagonal architecture with a timer-driven event loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareAdapter     LogEventSink   SettingsStore  SystemClock │
//! │  (Actuator+Motion)   (EventSink)    (NVS record)   (ClockPort) │
//! │  MqttAdapter         LogDisplay                                │
//! │  (EventSink + inbox) (DisplayPort)                             │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              AppService (pure logic)                   │    │
//! │  │  Activity FSM · Feeder · Quota · Sensors               │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  Button ISRs → InputState        Timers → EventQueue           │
//! │  Stepper timer → StepperCore     MQTT callback → MqttInbox     │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

// ── Imports ───────────────────────────────────────────────────
use anyhow::{Context, Result};
use log::{info, warn};

use esp_idf_hal::delay::FreeRtos;
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::sntp::EspSntp;
use esp_idf_svc::wifi::{BlockingWifi, ClientConfiguration, Configuration, EspWifi};

use hassfeeder::adapters::device_id;
use hassfeeder::adapters::display::LogDisplay;
use hassfeeder::adapters::hardware::HardwareAdapter;
use hassfeeder::adapters::log_sink::LogEventSink;
use hassfeeder::adapters::mqtt::{MqttAdapter, MqttInbox};
use hassfeeder::adapters::nvs::NvsAdapter;
use hassfeeder::adapters::settings_store::SettingsStore;
use hassfeeder::adapters::time::SystemClock;
use hassfeeder::app::ports::{ClockPort, SettingsPort};
use hassfeeder::app::service::AppService;
use hassfeeder::config::{CredentialString, Settings};
use hassfeeder::drivers::backlight::BacklightDriver;
use hassfeeder::drivers::button::InputState;
use hassfeeder::drivers::stepper::{StepperCore, StepperDriver};
use hassfeeder::drivers::{hw_init, hw_timer};
use hassfeeder::events::{Event, EventQueue};
use hassfeeder::hass::{HassNode, Inbound};

// ── Shared state ──────────────────────────────────────────────
//
// Each of these is handed out as `&'static` to exactly one producer
// context (ISR, esp_timer task, MQTT task) and to the main loop.

static INPUT: InputState = InputState::new(0);
static QUEUE: EventQueue = EventQueue::new();
static STEPPER: StepperCore = StepperCore::new();
static INBOX: MqttInbox = MqttInbox::new();

/// Minimum spacing between Wi-Fi reconnect attempts.
const WIFI_RETRY_MS: u32 = 10_000;
/// Main loop idle delay between queue drains.
const LOOP_DELAY_MS: u32 = 5;

const WIFI_SSID: Option<&str> = option_env!("WIFI_SSID");
const WIFI_PASS: Option<&str> = option_env!("WIFI_PASS");

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  HASS feeder v{}                     ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    let peripherals = Peripherals::take().context("peripherals already taken")?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs_partition = EspDefaultNvsPartition::take()?;

    // ── 2. Hardware ───────────────────────────────────────────
    if let Err(e) = hw_init::init_peripherals() {
        log::error!("HAL init failed ({}), halting", e);
        #[allow(clippy::empty_loop)]
        loop {}
    }
    if let Err(e) = hw_init::init_isr_service(&INPUT) {
        log::error!("ISR service init failed ({}), buttons disabled", e);
    }

    // ── 3. Settings ───────────────────────────────────────────
    let nvs = NvsAdapter::new()
        .map_err(hassfeeder::error::Error::from)
        .context("NVS init failed")?;
    let mut store = SettingsStore::new(nvs);
    let mut settings = match store.load() {
        Ok(s) => s,
        Err(e) => {
            warn!("Settings load failed ({}), using defaults", e);
            Settings::default()
        }
    };
    apply_build_defaults(&mut settings);

    // ── 4. Network ────────────────────────────────────────────
    let mut esp_wifi = EspWifi::new(peripherals.modem, sysloop.clone(), Some(nvs_partition))?;
    if let Err(e) = connect_wifi(&mut esp_wifi, &sysloop) {
        warn!("WiFi: initial connect failed ({e:#}), retrying in the loop");
    }
    let _sntp = EspSntp::new_default().context("failed to start SNTP")?;
    info!("SNTP initialized");

    // ── 5. Adapters ───────────────────────────────────────────
    let clock = SystemClock::new();
    let mac = device_id::read_mac();
    let node = HassNode::new(device_id::node_id(&mac).as_str());
    info!("Device node id: {}", node.node_id());

    let mut hw = HardwareAdapter::new(BacklightDriver::new(), StepperDriver::new(&STEPPER));
    let mut display = LogDisplay::new();
    let mut log_sink = LogEventSink::new();
    let mut mqtt = MqttAdapter::new(node, &INBOX, settings.mqtt.clone());

    // ── 6. App service ────────────────────────────────────────
    let mut app = AppService::new(settings, clock.uptime_ms());
    app.start(&INPUT.activity, &mut hw, &mut (&mut log_sink, &mut mqtt));

    let _timers = hw_timer::start_timers(&QUEUE, &STEPPER);
    let mut last_wifi_attempt = clock.uptime_ms();

    info!("System ready. Entering event loop.");

    // ── 7. Event loop ─────────────────────────────────────────
    loop {
        // Timer ticks.  Uptime is sampled per event so an interaction
        // stamped by the ISR is never ahead of the tick that sees it.
        while let Some(event) = QUEUE.pop() {
            let now_ms = clock.uptime_ms();
            let mut sink = (&mut log_sink, &mut mqtt);
            match event {
                Event::ControlTick => {
                    app.poll_input(&INPUT, &mut sink);
                    app.tick(now_ms, &INPUT.activity, &mut hw, &mut sink);
                }
                Event::RenderTick => app.render(&mut display),
                Event::ClockTick => app.tick_clock(
                    clock.wall_time(),
                    now_ms,
                    &INPUT.activity,
                    &mut hw,
                    &mut store,
                    &mut sink,
                ),
            }
        }

        // Inbound MQTT traffic.
        while let Some(msg) = INBOX.receive() {
            let now_ms = clock.uptime_ms();
            match mqtt.node().classify(&msg.topic, &msg.payload) {
                Inbound::Command(cmd) => app.handle_command(
                    cmd,
                    now_ms,
                    &INPUT.activity,
                    &mut hw,
                    &mut store,
                    &mut (&mut log_sink, &mut mqtt),
                ),
                Inbound::HomeAssistantOnline => {
                    info!("HASS | Home Assistant online, republishing");
                    resync(&mut mqtt, &app);
                }
                Inbound::Other => {
                    app.on_message(&msg.topic, &msg.payload, now_ms, &mut log_sink);
                }
                Inbound::Rejected => app.echo_state(&mut mqtt),
                Inbound::Dropped => {}
            }
        }

        // Connection upkeep.  Never blocks.
        let now_ms = clock.uptime_ms();
        if INBOX.take_resync() {
            resync(&mut mqtt, &app);
        }
        if !esp_wifi.is_connected().unwrap_or(false) {
            if now_ms.wrapping_sub(last_wifi_attempt) >= WIFI_RETRY_MS {
                last_wifi_attempt = now_ms;
                info!("WiFi: reconnecting");
                if let Err(e) = esp_wifi.connect() {
                    warn!("WiFi: reconnect failed ({e})");
                }
            }
        } else {
            mqtt.ensure_client(now_ms);
        }

        FreeRtos::delay_ms(LOOP_DELAY_MS);
    }
}

/// Fill an empty broker configuration from build-time environment.
fn apply_build_defaults(settings: &mut Settings) {
    if !settings.mqtt.server.is_empty() {
        return;
    }
    let Some(server) = option_env!("MQTT_SERVER") else {
        return;
    };
    settings.mqtt.server = credential(server);
    if let Some(port) = option_env!("MQTT_PORT").and_then(|p| p.parse().ok()) {
        settings.mqtt.port = port;
    }
    if let Some(user) = option_env!("MQTT_USER") {
        settings.mqtt.user = credential(user);
    }
    if let Some(password) = option_env!("MQTT_PASS") {
        settings.mqtt.password = credential(password);
    }
    info!("MQTT | using build-time broker {}", settings.mqtt.server);
}

fn credential(s: &str) -> CredentialString {
    let mut out = CredentialString::new();
    if out.push_str(s).is_err() {
        warn!("MQTT | build-time credential too long, ignored");
    }
    out
}

fn connect_wifi(esp_wifi: &mut EspWifi<'static>, sysloop: &EspSystemEventLoop) -> Result<()> {
    let (Some(ssid), Some(pass)) = (WIFI_SSID, WIFI_PASS) else {
        anyhow::bail!("no WIFI_SSID / WIFI_PASS set at build time");
    };
    let mut wifi = BlockingWifi::wrap(esp_wifi, sysloop.clone())?;
    wifi.set_configuration(&Configuration::Client(ClientConfiguration {
        ssid: ssid
            .try_into()
            .map_err(|_| anyhow::anyhow!("SSID too long"))?,
        password: pass
            .try_into()
            .map_err(|_| anyhow::anyhow!("password too long"))?,
        ..Default::default()
    }))?;
    wifi.start()?;
    wifi.connect()?;
    wifi.wait_netif_up()?;
    let ip = wifi.wifi().sta_netif().get_ip_info()?;
    info!("WiFi: connected, IP {}", ip.ip);
    Ok(())
}

fn resync(mqtt: &mut MqttAdapter, app: &AppService) {
    if let Err(e) = mqtt.resync(&app.snapshot()) {
        warn!("MQTT | resync failed: {e}");
    }
}
