use std::fs;
use std::fs::File;
use std::io;
use std::panic;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration, Utc};
use clap::{ArgAction, Parser, ValueHint};
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::{FontDesc, FontFamily, FontStyle};
use quali_trend::{
    collect_trend, CarSample, Lap, SeasonRound, Session, SessionSource, SkipReason, SourceError,
    TrendParams, TrendReport,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Cross-season qualifying telemetry trend CLI", long_about = None)]
struct Cli {
    /// Target driver code (three-letter acronym)
    #[arg(long, default_value = "VER")]
    driver: String,

    /// Driver display name for the figure title
    #[arg(long, default_value = "Max Verstappen")]
    driver_name: String,

    /// Circuit display name for the figure title
    #[arg(long, default_value = "Austin GP")]
    circuit: String,

    /// Optional JSON season->round map (object of year to round number)
    #[arg(long, value_hint = ValueHint::FilePath)]
    seasons: Option<PathBuf>,

    /// Provider API base URL
    #[arg(long, default_value = "https://api.openf1.org/v1")]
    api_base: String,

    /// Output PNG figure path
    #[arg(short, long, default_value = "quali_trend.png", value_hint = ValueHint::FilePath)]
    output: PathBuf,

    /// Output SVG figure path
    #[arg(long, value_hint = ValueHint::FilePath)]
    svg: Option<PathBuf>,

    /// Disable figure generation
    #[arg(long, action = ArgAction::SetTrue)]
    no_plot: bool,

    /// Optional CSV path for the per-season metric table
    #[arg(long, value_hint = ValueHint::FilePath)]
    csv: Option<PathBuf>,

    /// Provider response cache directory
    #[arg(long, default_value = ".cache/sessions", value_hint = ValueHint::FilePath)]
    cache_dir: PathBuf,

    /// Disable the provider response cache
    #[arg(long, action = ArgAction::SetTrue)]
    no_cache: bool,

    /// Verbose logging
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let rounds = match cli.seasons.as_ref() {
        Some(path) => load_season_map(path)?,
        None => default_rounds(),
    };
    if rounds.is_empty() {
        return Err(anyhow!("season map is empty"));
    }

    let cache = if cli.no_cache {
        None
    } else {
        Some(ResponseCache::new(cli.cache_dir.clone()))
    };
    let source = HttpSessionSource::new(cli.api_base.clone(), cli.driver.clone(), cache);
    let params = TrendParams::new(cli.driver.clone(), rounds);

    let report = collect_trend(&source, &params)?;
    info!(
        "Collected {} of {} seasons for {}",
        report.len(),
        params.rounds.len(),
        cli.driver
    );
    if !report.skipped.is_empty() {
        let load_failures = report
            .skipped
            .iter()
            .filter(|(_, reason)| matches!(reason, SkipReason::LoadFailed(_)))
            .count();
        let without_lap = report.skipped.len() - load_failures;
        info!(
            "Skipped {} season(s): {} load failures, {} without a fastest lap",
            report.skipped.len(),
            load_failures,
            without_lap
        );
    }

    if let Some(path) = cli.csv.as_ref() {
        write_metrics_csv(&report, path)?;
        info!("Wrote metric table: {}", path.display());
    }

    if !cli.no_plot {
        let figure = FigureConfig {
            driver_name: cli.driver_name.clone(),
            circuit: cli.circuit.clone(),
        };
        if let Err(err) = render_figure_guard(&report, &figure, &cli.output, ChartKind::Png) {
            warn!("Skipping PNG render ({}): {}", cli.output.display(), err);
        } else {
            info!("Wrote figure: {}", cli.output.display());
        }
        if let Some(path) = cli.svg.as_ref() {
            if let Err(err) = render_figure_guard(&report, &figure, path, ChartKind::Svg) {
                warn!("Skipping SVG render ({}): {}", path.display(), err);
            } else {
                info!("Wrote figure: {}", path.display());
            }
        }
    }

    Ok(())
}

/// Reference configuration: Austin GP round numbers by season.
fn default_rounds() -> Vec<SeasonRound> {
    vec![
        SeasonRound {
            season: 2021,
            round: 17,
        },
        SeasonRound {
            season: 2022,
            round: 19,
        },
        SeasonRound {
            season: 2023,
            round: 18,
        },
        SeasonRound {
            season: 2024,
            round: 19,
        },
    ]
}

fn load_season_map(path: &Path) -> Result<Vec<SeasonRound>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read season map {}", path.display()))?;
    let json: JsonValue = serde_json::from_str(&text)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;

    let object = json
        .as_object()
        .ok_or_else(|| anyhow!("season map must be a JSON object"))?;
    let mut rounds = Vec::with_capacity(object.len());
    for (key, value) in object {
        let season: u16 = key
            .parse()
            .with_context(|| format!("invalid season '{}': not a year", key))?;
        let round = value
            .as_u64()
            .ok_or_else(|| anyhow!("invalid round for '{}': expected integer", key))?;
        rounds.push(SeasonRound {
            season,
            round: round as u32,
        });
    }
    rounds.sort_by_key(|entry| entry.season);
    if rounds.is_empty() {
        warn!("Season map {} had no entries", path.display());
    }
    Ok(rounds)
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct MeetingRecord {
    meeting_key: i64,
    #[serde(default)]
    date_start: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SessionRecord {
    session_key: i64,
}

#[derive(Debug, Deserialize)]
struct DriverRecord {
    driver_number: u32,
}

#[derive(Debug, Deserialize)]
struct LapRecord {
    lap_number: u32,
    #[serde(default)]
    lap_duration: Option<f64>,
    #[serde(default)]
    duration_sector_1: Option<f64>,
    #[serde(default)]
    duration_sector_2: Option<f64>,
    #[serde(default)]
    duration_sector_3: Option<f64>,
    #[serde(default)]
    date_start: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CarDataRecord {
    date: String,
    speed: f64,
}

struct HttpSessionSource {
    client: reqwest::blocking::Client,
    base: String,
    driver: String,
    cache: Option<ResponseCache>,
}

impl HttpSessionSource {
    fn new(base: String, driver: String, cache: Option<ResponseCache>) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            base,
            driver,
            cache,
        }
    }

    fn fetch<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, SourceError> {
        let endpoint = format!("{}/{}", self.base.trim_end_matches('/'), path);
        let url =
            reqwest::Url::parse_with_params(&endpoint, query.iter().map(|(k, v)| (*k, v.as_str())))
                .map_err(|err| SourceError::Request(err.to_string()))?;
        let key = request_key(url.as_str());
        if let Some(body) = self.cache.as_ref().and_then(|cache| cache.lookup(&key)) {
            return serde_json::from_str(&body).map_err(|err| SourceError::Decode(err.to_string()));
        }

        debug!("GET {url}");
        let response = self
            .client
            .get(url.clone())
            .send()
            .map_err(|err| SourceError::Request(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Request(format!("{url} returned {status}")));
        }
        let body = response
            .text()
            .map_err(|err| SourceError::Request(err.to_string()))?;
        let decoded =
            serde_json::from_str(&body).map_err(|err| SourceError::Decode(err.to_string()))?;
        if let Some(cache) = self.cache.as_ref() {
            cache.store(&key, &body);
        }
        Ok(decoded)
    }

    /// Rounds index the year's meetings ordered by start date (1-based).
    fn meeting_key(&self, round: SeasonRound) -> Result<i64, SourceError> {
        if round.round == 0 {
            return Err(SourceError::Missing {
                entity: "meeting",
                context: format!("{} round 0", round.season),
            });
        }
        let mut meetings: Vec<MeetingRecord> =
            self.fetch("meetings", &[("year", round.season.to_string())])?;
        meetings.sort_by(|a, b| a.date_start.cmp(&b.date_start));
        meetings
            .get(round.round as usize - 1)
            .map(|meeting| meeting.meeting_key)
            .ok_or_else(|| SourceError::Missing {
                entity: "meeting",
                context: format!("{} round {}", round.season, round.round),
            })
    }

    fn driver_number(&self, session_key: i64) -> Result<u32, SourceError> {
        let drivers: Vec<DriverRecord> = self.fetch(
            "drivers",
            &[
                ("session_key", session_key.to_string()),
                ("name_acronym", self.driver.clone()),
            ],
        )?;
        drivers
            .first()
            .map(|driver| driver.driver_number)
            .ok_or_else(|| SourceError::Missing {
                entity: "driver",
                context: format!("{} in session {}", self.driver, session_key),
            })
    }

    fn decode_laps(&self, records: Vec<LapRecord>) -> Vec<Lap> {
        records
            .into_iter()
            .filter_map(|record| {
                let time_s = record.lap_duration?;
                let sector_times_s = [
                    record.duration_sector_1?,
                    record.duration_sector_2?,
                    record.duration_sector_3?,
                ];
                let started_at = record.date_start.as_deref().and_then(parse_provider_date)?;
                Some(Lap {
                    driver: self.driver.clone(),
                    number: record.lap_number,
                    time_s,
                    sector_times_s,
                    started_at,
                })
            })
            .collect()
    }
}

impl SessionSource for HttpSessionSource {
    fn load_qualifying(&self, round: SeasonRound) -> Result<Session, SourceError> {
        let meeting_key = self.meeting_key(round)?;
        let sessions: Vec<SessionRecord> = self.fetch(
            "sessions",
            &[
                ("meeting_key", meeting_key.to_string()),
                ("session_name", "Qualifying".to_string()),
            ],
        )?;
        let session_key = sessions
            .first()
            .map(|session| session.session_key)
            .ok_or_else(|| SourceError::Missing {
                entity: "qualifying session",
                context: format!("meeting {meeting_key}"),
            })?;
        let driver_number = self.driver_number(session_key)?;
        let records: Vec<LapRecord> = self.fetch(
            "laps",
            &[
                ("session_key", session_key.to_string()),
                ("driver_number", driver_number.to_string()),
            ],
        )?;
        let laps = self.decode_laps(records);
        debug!(
            season = round.season,
            session_key,
            laps = laps.len(),
            "loaded qualifying session"
        );
        Ok(Session {
            round,
            provider_key: session_key,
            laps,
        })
    }

    fn car_data(&self, session: &Session, lap: &Lap) -> Result<Vec<CarSample>, SourceError> {
        let driver_number = self.driver_number(session.provider_key)?;
        let window_end = lap.started_at + Duration::milliseconds((lap.time_s * 1000.0).ceil() as i64);
        let records: Vec<CarDataRecord> = self.fetch(
            "car_data",
            &[
                ("session_key", session.provider_key.to_string()),
                ("driver_number", driver_number.to_string()),
                ("date>", lap.started_at.to_rfc3339()),
                ("date<", window_end.to_rfc3339()),
            ],
        )?;

        let mut stamped = Vec::with_capacity(records.len());
        for record in records {
            let date = parse_provider_date(&record.date).ok_or_else(|| {
                SourceError::Decode(format!("bad car data timestamp '{}'", record.date))
            })?;
            stamped.push((date, record.speed));
        }
        stamped.sort_by_key(|(date, _)| *date);

        let Some(&(start, _)) = stamped.first() else {
            return Ok(Vec::new());
        };
        Ok(stamped
            .into_iter()
            .map(|(date, speed)| CarSample {
                time_s: (date - start).num_milliseconds() as f64 / 1000.0,
                speed_kmh: speed,
            })
            .collect())
    }
}

fn parse_provider_date(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|date| date.with_timezone(&Utc))
}

// ---------------------------------------------------------------------------
// Response cache
// ---------------------------------------------------------------------------

struct ResponseCache {
    dir: PathBuf,
}

impl ResponseCache {
    fn new(dir: PathBuf) -> Self {
        let _ = fs::create_dir_all(&dir);
        Self { dir }
    }

    fn lookup(&self, key: &str) -> Option<String> {
        fs::read_to_string(self.dir.join(format!("{key}.json"))).ok()
    }

    // Best-effort: a failed write only costs the next run a refetch.
    fn store(&self, key: &str, body: &str) {
        let _ = fs::write(self.dir.join(format!("{key}.json")), body);
    }
}

fn request_key(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    let digest = hasher.finalize();
    digest
        .iter()
        .take(16)
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

// ---------------------------------------------------------------------------
// CSV export
// ---------------------------------------------------------------------------

fn write_metrics_csv(report: &TrendReport, path: &Path) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = csv::Writer::from_writer(file);
    writer.write_record([
        "season",
        "lap_time_s",
        "sector1_s",
        "sector2_s",
        "sector3_s",
    ])?;

    for idx in 0..report.len() {
        let sectors = report.sector_times_s[idx];
        writer.write_record([
            report.seasons[idx].to_string(),
            format!("{:.3}", report.lap_times_s[idx]),
            format!("{:.3}", sectors[0]),
            format!("{:.3}", sectors[1]),
            format!("{:.3}", sectors[2]),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Figure rendering
// ---------------------------------------------------------------------------

const FIGURE_SIZE: (u32, u32) = (1400, 1200);

const SEASON_COLORS: [RGBColor; 4] = [
    RGBColor(30, 144, 255),
    RGBColor(250, 128, 114),
    RGBColor(34, 139, 34),
    RGBColor(216, 191, 216),
];
const SECTOR_COLORS: [RGBColor; 3] = [
    RGBColor(30, 144, 255),
    RGBColor(250, 128, 114),
    RGBColor(34, 139, 34),
];
const LAP_TIME_COLOR: RGBColor = RGBColor(200, 0, 100);

#[derive(Clone, Debug)]
struct FigureConfig {
    driver_name: String,
    circuit: String,
}

#[derive(Clone, Copy)]
enum ChartKind {
    Png,
    Svg,
}

fn season_color(idx: usize) -> RGBColor {
    SEASON_COLORS[idx % SEASON_COLORS.len()]
}

fn caption_font() -> FontDesc<'static> {
    FontDesc::new(FontFamily::SansSerif, 20.0, FontStyle::Normal)
}

fn panel_font() -> FontDesc<'static> {
    FontDesc::new(FontFamily::SansSerif, 15.0, FontStyle::Normal)
}

fn legend_font() -> FontDesc<'static> {
    FontDesc::new(FontFamily::SansSerif, 14.0, FontStyle::Normal)
}

fn render_figure_guard(
    report: &TrendReport,
    figure: &FigureConfig,
    path: &Path,
    kind: ChartKind,
) -> Result<(), String> {
    panic::catch_unwind(panic::AssertUnwindSafe(|| {
        render_figure(report, figure, path, kind).map_err(|err| format!("plotting error: {err}"))
    }))
    .map_err(|_| "plotting backend panicked".to_string())?
}

fn render_figure(
    report: &TrendReport,
    figure: &FigureConfig,
    path: &Path,
    kind: ChartKind,
) -> Result<()> {
    match kind {
        ChartKind::Png => {
            let root = BitMapBackend::new(path, FIGURE_SIZE).into_drawing_area();
            draw_figure(root, report, figure)
        }
        ChartKind::Svg => {
            let root = SVGBackend::new(path, FIGURE_SIZE).into_drawing_area();
            draw_figure(root, report, figure)
        }
    }
}

fn figure_title(report: &TrendReport, figure: &FigureConfig) -> String {
    let span = match (report.seasons.first(), report.seasons.last()) {
        (Some(first), Some(last)) if first != last => format!("{first}-{last}"),
        (Some(first), _) => first.to_string(),
        _ => "no seasons".to_string(),
    };
    format!(
        "{} - {} Qualifying ({})",
        figure.driver_name, figure.circuit, span
    )
}

fn draw_figure<DB>(
    root: DrawingArea<DB, Shift>,
    report: &TrendReport,
    figure: &FigureConfig,
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    root.fill(&WHITE)?;
    let title = figure_title(report, figure);
    let body = root.titled(
        &title,
        FontDesc::new(FontFamily::SansSerif, 30.0, FontStyle::Normal),
    )?;
    let panels = body.split_evenly((3, 2));

    draw_lap_time_bars(&panels[0], report)?;
    draw_sector_lines(&panels[1], report)?;
    draw_speed_traces(&panels[2], report)?;
    draw_corner_delta_bars(&panels[3], report)?;
    draw_lap_time_trend(&panels[4], report)?;
    // panels[5] is deliberately left blank.

    body.present()?;
    Ok(())
}

fn season_axis_range(seasons: &[u16]) -> std::ops::Range<f64> {
    let min = seasons.iter().copied().min().unwrap_or(0) as f64;
    let max = seasons.iter().copied().max().unwrap_or(0) as f64;
    (min - 0.6)..(max + 0.6)
}

fn draw_panel_note<DB>(area: &DrawingArea<DB, Shift>, note: &str) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let (width, height) = area.dim_in_pixel();
    let style =
        FontDesc::new(FontFamily::SansSerif, 13.0, FontStyle::Normal).color(&BLACK.mix(0.6));
    let x = (width as i32 / 2 - note.len() as i32 * 3).max(4);
    area.draw(&Text::new(note.to_string(), (x, height as i32 - 16), style))?;
    Ok(())
}

fn draw_lap_time_bars<DB>(area: &DrawingArea<DB, Shift>, report: &TrendReport) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    if report.is_empty() {
        return Ok(());
    }

    let y_max = report.lap_times_s.iter().copied().fold(1.0, f64::max) * 1.05;
    let mut chart = ChartBuilder::on(area)
        .margin(20)
        .caption("Fastest Qualifying Lap Time", caption_font())
        .set_label_area_size(LabelAreaPosition::Left, 55)
        .set_label_area_size(LabelAreaPosition::Bottom, 40)
        .build_cartesian_2d(season_axis_range(&report.seasons), 0.0..y_max)?;

    chart
        .configure_mesh()
        .light_line_style(&TRANSPARENT)
        .bold_line_style(&TRANSPARENT)
        .x_labels(report.len())
        .x_label_formatter(&|v| format!("{v:.0}"))
        .y_desc("Lap time (s)")
        .label_style(panel_font())
        .draw()?;

    chart.draw_series(report.seasons.iter().zip(report.lap_times_s.iter()).map(
        |(&season, &lap_time)| {
            let x = season as f64;
            Rectangle::new(
                [(x - 0.35, 0.0), (x + 0.35, lap_time)],
                LAP_TIME_COLOR.mix(0.7).filled(),
            )
        },
    ))?;

    draw_panel_note(area, "Absolute one-lap pace each year")
}

fn draw_sector_lines<DB>(area: &DrawingArea<DB, Shift>, report: &TrendReport) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    if report.is_empty() {
        return Ok(());
    }

    let mut y_min = f64::INFINITY;
    let mut y_max = f64::NEG_INFINITY;
    for sectors in &report.sector_times_s {
        for &sector in sectors {
            y_min = y_min.min(sector);
            y_max = y_max.max(sector);
        }
    }
    let pad = ((y_max - y_min) * 0.1).max(0.5);

    let mut chart = ChartBuilder::on(area)
        .margin(20)
        .caption("Sector Times", caption_font())
        .set_label_area_size(LabelAreaPosition::Left, 55)
        .set_label_area_size(LabelAreaPosition::Bottom, 40)
        .build_cartesian_2d(
            season_axis_range(&report.seasons),
            (y_min - pad)..(y_max + pad),
        )?;

    chart
        .configure_mesh()
        .light_line_style(&TRANSPARENT)
        .bold_line_style(&TRANSPARENT)
        .x_labels(report.len())
        .x_label_formatter(&|v| format!("{v:.0}"))
        .y_desc("Time (s)")
        .label_style(panel_font())
        .draw()?;

    for (sector_idx, label) in ["Sector 1", "Sector 2", "Sector 3"].iter().enumerate() {
        let color = SECTOR_COLORS[sector_idx];
        let points: Vec<(f64, f64)> = report
            .seasons
            .iter()
            .zip(report.sector_times_s.iter())
            .map(|(&season, sectors)| (season as f64, sectors[sector_idx]))
            .collect();
        chart
            .draw_series(LineSeries::new(points.iter().copied(), color))?
            .label(*label)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
        chart.draw_series(
            points
                .iter()
                .map(|&(x, y)| Circle::new((x, y), 3, color.filled())),
        )?;
    }

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.7))
        .border_style(&BLACK.mix(0.3))
        .label_font(legend_font())
        .position(SeriesLabelPosition::UpperLeft)
        .draw()?;

    draw_panel_note(area, "Strengths and weaknesses in each sector")
}

fn draw_speed_traces<DB>(area: &DrawingArea<DB, Shift>, report: &TrendReport) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    if report.is_empty() {
        return Ok(());
    }

    let x_max = report
        .speed_traces
        .iter()
        .map(|trace| trace.max_distance_m())
        .fold(1.0, f64::max);
    let y_max = report
        .speed_traces
        .iter()
        .flat_map(|trace| trace.speed_kmh.iter().copied())
        .fold(1.0, f64::max)
        * 1.08;

    let mut chart = ChartBuilder::on(area)
        .margin(20)
        .caption("Speed Trace", caption_font())
        .set_label_area_size(LabelAreaPosition::Left, 55)
        .set_label_area_size(LabelAreaPosition::Bottom, 40)
        .build_cartesian_2d(0.0..x_max, 0.0..y_max)?;

    chart
        .configure_mesh()
        .light_line_style(&TRANSPARENT)
        .bold_line_style(&TRANSPARENT)
        .x_desc("Distance (m)")
        .y_desc("Speed (km/h)")
        .label_style(panel_font())
        .draw()?;

    for (idx, trace) in report.speed_traces.iter().enumerate() {
        let color = season_color(idx);
        chart
            .draw_series(LineSeries::new(
                trace
                    .distance_m
                    .iter()
                    .copied()
                    .zip(trace.speed_kmh.iter().copied()),
                &color,
            ))?
            .label(report.seasons[idx].to_string())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
    }

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.7))
        .border_style(&BLACK.mix(0.3))
        .label_font(legend_font())
        .position(SeriesLabelPosition::UpperLeft)
        .draw()?;

    draw_panel_note(area, "Speed profile around the lap each year")
}

fn draw_corner_delta_bars<DB>(area: &DrawingArea<DB, Shift>, report: &TrendReport) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    if report.is_empty() {
        return Ok(());
    }
    let corners = report
        .corner_deltas
        .first()
        .map(|deltas| deltas.len())
        .unwrap_or(0);
    if corners == 0 {
        return Ok(());
    }

    let mut y_min = f64::INFINITY;
    let mut y_max = f64::NEG_INFINITY;
    for deltas in &report.corner_deltas {
        for &delta in deltas {
            y_min = y_min.min(delta);
            y_max = y_max.max(delta);
        }
    }
    let pad = ((y_max - y_min) * 0.1).max(0.5);
    let x_max = corners as f64 + 0.2 * report.len() as f64 + 0.6;

    let mut chart = ChartBuilder::on(area)
        .margin(20)
        .caption("Corner-by-Corner Delta vs Average", caption_font())
        .set_label_area_size(LabelAreaPosition::Left, 55)
        .set_label_area_size(LabelAreaPosition::Bottom, 40)
        .build_cartesian_2d(0.4..x_max, (y_min - pad)..(y_max + pad))?;

    chart
        .configure_mesh()
        .light_line_style(&TRANSPARENT)
        .bold_line_style(&TRANSPARENT)
        .x_desc("Corner #")
        .y_desc("Delta (km/h)")
        .x_label_formatter(&|v| format!("{v:.0}"))
        .label_style(panel_font())
        .draw()?;

    for (idx, deltas) in report.corner_deltas.iter().enumerate() {
        let color = season_color(idx);
        let offset = idx as f64 * 0.2;
        chart
            .draw_series(deltas.iter().enumerate().map(|(corner, &delta)| {
                let x0 = corner as f64 + 1.0 + offset - 0.1;
                Rectangle::new(
                    [(x0, delta.min(0.0)), (x0 + 0.2, delta.max(0.0))],
                    color.mix(0.8).filled(),
                )
            }))?
            .label(report.seasons[idx].to_string())
            .legend(move |(x, y)| Rectangle::new([(x, y - 4), (x + 12, y + 4)], color.filled()));
    }

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.7))
        .border_style(&BLACK.mix(0.3))
        .label_font(legend_font())
        .position(SeriesLabelPosition::UpperLeft)
        .draw()?;

    draw_panel_note(area, "Positive = faster than lap average")
}

fn draw_lap_time_trend<DB>(area: &DrawingArea<DB, Shift>, report: &TrendReport) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    if report.is_empty() {
        return Ok(());
    }

    let y_min = report
        .lap_times_s
        .iter()
        .copied()
        .fold(f64::INFINITY, f64::min);
    let y_max = report
        .lap_times_s
        .iter()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max);
    let pad = ((y_max - y_min) * 0.15).max(0.2);

    let mut chart = ChartBuilder::on(area)
        .margin(20)
        .caption("Lap Time Trend", caption_font())
        .set_label_area_size(LabelAreaPosition::Left, 55)
        .set_label_area_size(LabelAreaPosition::Bottom, 40)
        .build_cartesian_2d(
            season_axis_range(&report.seasons),
            (y_min - pad)..(y_max + pad),
        )?;

    chart
        .configure_mesh()
        .light_line_style(&TRANSPARENT)
        .bold_line_style(&TRANSPARENT)
        .x_labels(report.len())
        .x_label_formatter(&|v| format!("{v:.0}"))
        .x_desc("Year")
        .y_desc("Lap time (s)")
        .label_style(panel_font())
        .draw()?;

    let points: Vec<(f64, f64)> = report
        .seasons
        .iter()
        .zip(report.lap_times_s.iter())
        .map(|(&season, &lap_time)| (season as f64, lap_time))
        .collect();
    chart.draw_series(LineSeries::new(points.iter().copied(), &LAP_TIME_COLOR))?;
    chart.draw_series(
        points
            .iter()
            .map(|&(x, y)| Circle::new((x, y), 3, LAP_TIME_COLOR.filled())),
    )?;

    draw_panel_note(area, "Improvement or consistency across seasons")
}
