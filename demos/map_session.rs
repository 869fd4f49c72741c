//! Walk a map session from the country view down to individual markers.
//!
//! Run with: cargo run --example map_session

use poppool_map_core::{
    GpsPoint, MapMarker, MarkerData, MarkerFactory, MarkerIcon, MarkerKey, MarkerReconciler,
    SelectionChange, Store, ZoomLevel,
};

/// Prints every call the reconciler makes, standing in for a map SDK marker.
struct ConsoleMarker {
    key: MarkerKey,
}

impl MapMarker for ConsoleMarker {
    fn set_position(&mut self, position: GpsPoint) {
        println!("   {} -> position ({:.4}, {:.4})", self.key, position.latitude, position.longitude);
    }

    fn set_icon(&mut self, icon: &MarkerIcon) {
        println!(
            "   {} -> icon '{}' x{}{}",
            self.key,
            icon.label,
            icon.count,
            if icon.selected { " (selected)" } else { "" }
        );
    }

    fn set_visible(&mut self, visible: bool) {
        println!("   {} -> {}", self.key, if visible { "shown" } else { "removed" });
    }

    fn set_user_data(&mut self, _data: &MarkerData) {}
}

struct ConsoleFactory;

impl MarkerFactory for ConsoleFactory {
    type Marker = ConsoleMarker;

    fn create_marker(&mut self, key: &MarkerKey) -> ConsoleMarker {
        ConsoleMarker { key: key.clone() }
    }
}

fn main() {
    let stores = vec![
        Store::new(101, "성수 향수 팝업", "서울특별시 성동구 연무장길 41", 37.5445, 127.0560),
        Store::new(102, "성수 굿즈 팝업", "서울특별시 성동구 연무장길 41", 37.5445, 127.0560),
        Store::new(103, "더현대 캐릭터展", "서울특별시 영등포구 여의대로 108", 37.5259, 126.9284),
        Store::new(104, "홍대 아트 팝업", "서울특별시 마포구 와우산로 94", 37.5509, 126.9227),
        Store::new(105, "판교 테크 팝업", "경기도 성남시 분당구 판교역로 146", 37.3947, 127.1112),
        Store::new(106, "해운대 비치 팝업", "부산광역시 해운대구 해운대해변로 264", 35.1587, 129.1604),
    ];

    let mut reconciler = MarkerReconciler::new(ConsoleFactory);

    for zoom in [6.0, 8.0, 10.0, 12.0, 15.0] {
        println!("zoom {:.1} ({})", zoom, ZoomLevel::from_zoom(zoom));
        let report = reconciler.reconcile(&stores, zoom);
        println!(
            "   created={} updated={} unchanged={} removed={} dropped={}{}\n",
            report.created,
            report.updated,
            report.unchanged,
            report.removed,
            report.dropped.len(),
            if report.unsupported_tier { " (no clustering at this tier)" } else { "" }
        );
    }

    println!("select the shared Seongsu marker");
    reconciler.select(&MarkerKey::Store(101));

    println!("\nrefresh without the Seongsu stores");
    let report = reconciler.reconcile(&stores[2..], 15.0);
    if report.selection == SelectionChange::Invalidated {
        println!("   selection cleared, closing the store carousel");
    }
}
