use busbox::{
    display::{render, scroll_line, Scroller, ScreenLayout},
    settings::Settings,
    transit::{bus::parse_siri, bus::format_bus_lines, train::format_train_lines, train::parse_board},
};
use chrono::{TimeZone, Utc};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

const SIRI: &str = r#"<Siri xmlns="http://www.siri.org.uk/siri" version="1.3">
  <ServiceDelivery><StopMonitoringDelivery version="1.3">
    <MonitoredStopVisit><MonitoredVehicleJourney>
      <PublishedLineName>26</PublishedLineName>
      <DestinationName>Reading Station</DestinationName>
      <MonitoredCall><ExpectedArrivalTime>2024-05-01T12:12:00Z</ExpectedArrivalTime></MonitoredCall>
    </MonitoredVehicleJourney></MonitoredStopVisit>
    <MonitoredStopVisit><MonitoredVehicleJourney>
      <PublishedLineName>17</PublishedLineName>
      <DestinationName>Tilehurst Triangle via Oxford Road</DestinationName>
      <MonitoredCall><AimedArrivalTime>2024-05-01T12:20:00Z</AimedArrivalTime></MonitoredCall>
    </MonitoredVehicleJourney></MonitoredStopVisit>
  </StopMonitoringDelivery></ServiceDelivery>
</Siri>"#;

const BOARD: &str = r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/"><soap:Body>
  <GetDepBoardWithDetailsResponse><GetStationBoardResult><trainServices>
    <service><std>12:01</std><etd>On time</etd><platform>9</platform>
      <subsequentCallingPoints><callingPointList>
        <callingPoint><crs>SLO</crs><st>12:13</st></callingPoint>
        <callingPoint><crs>PAD</crs><st>12:28</st></callingPoint>
      </callingPointList></subsequentCallingPoints>
    </service>
  </trainServices></GetStationBoardResult></GetDepBoardWithDetailsResponse>
</soap:Body></soap:Envelope>"#;

/// Upstream documents reduced to display lines
fn bench_parsing(c: &mut Criterion) {
    let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

    c.bench_function("siri_to_bus_lines", |b| {
        b.iter(|| {
            let departures = parse_siri(SIRI, &now);
            format_bus_lines(Some(departures.as_slice()))
        })
    });

    c.bench_function("ldb_board_to_train_lines", |b| {
        b.iter(|| {
            let services = parse_board(BOARD, "PAD").expect("Should parse board");
            format_train_lines(Some(services.as_slice()))
        })
    });
}

/// One display tick: scroll every row and rasterize the frame
fn bench_display_tick(c: &mut Criterion) {
    let layout = ScreenLayout::default();
    let columns = layout.columns();
    let mut scroller = Scroller::new();
    scroller.update(vec![
        "12:00 4/9°C 20% W5>8m/s".to_string(),
        "5m 26 Reading Station".to_string(),
        "12m 17 Tilehurst Triangle via Oxford Road".to_string(),
        "12:01->12:28 p.9 27m".to_string(),
    ]);

    c.bench_function("display_tick", |b| {
        b.iter(|| {
            scroller.advance();
            render(&layout, &scroller.rows(&columns))
        })
    });

    for width in [18usize, 21, 48].iter() {
        c.bench_with_input(BenchmarkId::new("scroll_line", width), width, |b, &width| {
            let mut counter = 0;
            b.iter(|| {
                counter += 1;
                scroll_line("12m 17 Tilehurst Triangle via Oxford Road and beyond", counter, width)
            })
        });
    }
}

/// Settings document parse and write, done on every dashboard change
fn bench_settings_json(c: &mut Criterion) {
    let mut settings = Settings::default();
    for name in ["Work", "Gym", "Parents"] {
        settings.add_tab(name);
    }
    let json = serde_json::to_string_pretty(&settings).expect("Should serialize");

    c.bench_function("settings_serialize", |b| {
        b.iter(|| serde_json::to_string_pretty(&settings).expect("Should serialize"))
    });

    c.bench_function("settings_deserialize", |b| {
        b.iter(|| serde_json::from_str::<Settings>(&json).expect("Should deserialize"))
    });
}

criterion_group!(benches, bench_parsing, bench_display_tick, bench_settings_json);
criterion_main!(benches);
