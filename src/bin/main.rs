#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]

use edgesense_core::{
    Cadence, ClockSync, LinkStatus, LinkSupervisor, ReadingCell, Reporter, Sampler, UploadTarget,
};
use embassy_executor::Spawner;
use embassy_futures::join::{join, join4};
use embassy_time::{Instant, Timer};
use esp_hal::clock::CpuClock;
use esp_hal::i2c::master::{Config as I2cConfig, I2c};
use esp_hal::timer::timg::TimerGroup;
use esp_radio::wifi::{ClientConfig, ModeConfig};
use log::{LevelFilter, error, info};
use static_cell::StaticCell;

use http::HttpUploader;
use sensor::Sht41Source;
use sntp::SntpClient;
use wifi::WifiLink;

#[path = "main/http.rs"]
mod http;
#[path = "main/sensor.rs"]
mod sensor;
#[path = "main/sntp.rs"]
mod sntp;
#[path = "main/wifi.rs"]
mod wifi;

/// Location tag attached to every measurement line.
const DEVICE_TAG: &str = "sht41";
const NTP_SERVER: &str = "pool.ntp.org";
const TZ_OFFSET_SECS: i32 = -7 * 3_600;
/// The scheduler wakes once a second just to keep the process alive.
const IDLE_TICK_SECS: u64 = 1;

const WIFI_SSID: &str = env!(
    "WIFI_SSID",
    "Set WIFI_SSID in your environment before building/flashing."
);
const WIFI_PASSWORD: &str = env!(
    "WIFI_PASSWORD",
    "Set WIFI_PASSWORD in your environment before building/flashing."
);
const SENSOR_SAMPLING_INTERVAL: &str = env!(
    "SENSOR_SAMPLING_INTERVAL",
    "Set SENSOR_SAMPLING_INTERVAL (seconds) in your environment before building/flashing."
);
const REPORTING_INTERVAL_SECONDS: &str = env!(
    "REPORTING_INTERVAL_SECONDS",
    "Set REPORTING_INTERVAL_SECONDS (seconds) in your environment before building/flashing."
);
const INFLUXDB_URL_BASE: &str = env!(
    "INFLUXDB_URL_BASE",
    "Set INFLUXDB_URL_BASE in your environment before building/flashing."
);
const INFLUXDB_ORG: &str = env!(
    "INFLUXDB_ORG",
    "Set INFLUXDB_ORG in your environment before building/flashing."
);
const INFLUXDB_BUCKET: &str = env!(
    "INFLUXDB_BUCKET",
    "Set INFLUXDB_BUCKET in your environment before building/flashing."
);
const INFLUXDB_TOKEN: &str = env!(
    "INFLUXDB_TOKEN",
    "Set INFLUXDB_TOKEN in your environment before building/flashing."
);
const INFLUXDB_MEASUREMENT: &str = env!(
    "INFLUXDB_MEASUREMENT",
    "Set INFLUXDB_MEASUREMENT in your environment before building/flashing."
);

static LINK_STATUS: LinkStatus = LinkStatus::new();
static READINGS: ReadingCell = ReadingCell::new();
static NET_RESOURCES: StaticCell<embassy_net::StackResources<4>> = StaticCell::new();

#[panic_handler]
fn panic(_: &core::panic::PanicInfo) -> ! {
    loop {}
}

// This creates a default app-descriptor required by the esp-idf bootloader.
// For more information see: <https://docs.espressif.com/projects/esp-idf/en/stable/esp32/api-reference/system/app_image_format.html#application-description>
esp_bootloader_esp_idf::esp_app_desc!();

#[esp_rtos::main]
async fn main(_spawner: Spawner) -> ! {
    esp_println::logger::init_logger(LevelFilter::Info);
    esp_println::println!("boot: edgesense starting");

    // Configuration errors are the only fatal condition; nothing is spawned
    // until both parses succeed.
    let cadence = match Cadence::parse(SENSOR_SAMPLING_INTERVAL, REPORTING_INTERVAL_SECONDS) {
        Ok(cadence) => cadence,
        Err(err) => {
            error!("config: {}", err);
            loop {
                Timer::after_secs(IDLE_TICK_SECS).await;
            }
        }
    };
    let target = match UploadTarget::parse(
        INFLUXDB_URL_BASE,
        INFLUXDB_ORG,
        INFLUXDB_BUCKET,
        INFLUXDB_TOKEN,
    ) {
        Ok(target) => target,
        Err(err) => {
            error!("config: {}", err);
            loop {
                Timer::after_secs(IDLE_TICK_SECS).await;
            }
        }
    };

    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    // esp-radio requires an allocator.
    esp_alloc::heap_allocator!(#[esp_hal::ram(reclaimed)] size: 65536);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    // SHT41 wiring: SDA=GPIO4, SCL=GPIO5.
    let i2c = match I2c::new(peripherals.I2C0, I2cConfig::default()) {
        Ok(i2c) => i2c.with_sda(peripherals.GPIO4).with_scl(peripherals.GPIO5),
        Err(err) => {
            error!("i2c init failed: {:?}", err);
            loop {
                Timer::after_secs(IDLE_TICK_SECS).await;
            }
        }
    };
    let mut sht41 = Sht41Source::new(i2c);
    sht41.log_serial_number();

    let radio = match esp_radio::init() {
        Ok(radio) => radio,
        Err(err) => {
            error!("esp-radio init failed: {:?}", err);
            loop {
                Timer::after_secs(IDLE_TICK_SECS).await;
            }
        }
    };

    let (mut wifi_controller, interfaces) =
        match esp_radio::wifi::new(&radio, peripherals.WIFI, esp_radio::wifi::Config::default()) {
            Ok(parts) => parts,
            Err(err) => {
                error!("wifi peripheral init failed: {:?}", err);
                loop {
                    Timer::after_secs(IDLE_TICK_SECS).await;
                }
            }
        };

    let client_config = ClientConfig::default()
        .with_ssid(WIFI_SSID.into())
        .with_password(WIFI_PASSWORD.into());
    if let Err(err) = wifi_controller.set_config(&ModeConfig::Client(client_config)) {
        error!("wifi mode config failed: {:?}", err);
        loop {
            Timer::after_secs(IDLE_TICK_SECS).await;
        }
    }

    let stack_config = embassy_net::Config::dhcpv4(Default::default());
    let (stack, mut net_runner) = embassy_net::new(
        interfaces.sta,
        stack_config,
        NET_RESOURCES.init(embassy_net::StackResources::<4>::new()),
        0x4AD1_0E55_31B2_77C0,
    );

    info!(
        "edgesense started: sampling_interval={}s reporting_interval={}s",
        cadence.sampling_interval_secs, cadence.reporting_interval_secs
    );
    info!(
        "destination: host={} port={} target={} measurement={} device={}",
        target.host, target.port, target.request_target, INFLUXDB_MEASUREMENT, DEVICE_TAG
    );
    info!("ntp: server={} tz_offset_secs={}", NTP_SERVER, TZ_OFFSET_SECS);

    let boot = Instant::now();

    let net_future = net_runner.run();

    let link_future = async {
        let mut link = WifiLink::new(wifi_controller, stack);
        let mut supervisor = LinkSupervisor::new();
        loop {
            let outcome = supervisor.poll(&mut link, &LINK_STATUS).await;
            Timer::after_secs(outcome.wait_secs()).await;
        }
    };

    let clock_future = async {
        let mut source = SntpClient::new(stack, NTP_SERVER);
        let mut sync = ClockSync::new(TZ_OFFSET_SECS);
        loop {
            let outcome = sync.poll(&mut source, &LINK_STATUS).await;
            Timer::after_secs(outcome.wait_secs()).await;
        }
    };

    let sample_future = async {
        let mut sampler = Sampler::new(&cadence);
        loop {
            sampler.poll(&mut sht41, &READINGS);
            Timer::after_secs(sampler.interval_secs() as u64).await;
        }
    };

    let report_future = async {
        let mut uploader = HttpUploader::new(stack, &target);
        let mut reporter = Reporter::new(INFLUXDB_MEASUREMENT, DEVICE_TAG);
        loop {
            let now_ms = boot.elapsed().as_millis();
            let outcome = reporter
                .poll(&mut uploader, &READINGS, &LINK_STATUS, now_ms)
                .await;
            Timer::after_secs(outcome.wait_secs(cadence.reporting_interval_secs)).await;
        }
    };

    // Keep-alive loop: the four workers above never return, this just makes
    // that explicit at the top level.
    let idle_future = async {
        loop {
            Timer::after_secs(IDLE_TICK_SECS).await;
        }
    };

    let _ = join(
        join4(net_future, link_future, clock_future, sample_future),
        join(report_future, idle_future),
    )
    .await;
    unreachable!()
}
