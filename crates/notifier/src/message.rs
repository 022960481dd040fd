//! Message templates for order and monitor notifications (§10.5).

use std::fmt::Write as _;

/// One row of availability shown in a monitor notification. Decoupled
/// from `booking_domain::models::Slot` since the date a slot belongs to
/// is tracked by the caller, not the slot itself.
#[derive(Debug, Clone)]
pub struct MonitorSlotLine {
    pub date: String,
    pub start: String,
    pub end: String,
    pub field_name: Option<String>,
    pub area_name: Option<String>,
    pub remain: Option<i64>,
    pub price: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct OrderNotification {
    pub order_id: Option<String>,
    pub user_nickname: String,
    pub venue_name: String,
    pub field_type_name: String,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct MonitorNotification {
    pub monitor_id: String,
    pub venue_name: Option<String>,
    pub field_type_name: Option<String>,
    pub slots: Vec<MonitorSlotLine>,
    pub auto_book: bool,
    pub preferred_hours: Vec<u32>,
    pub preferred_days: Vec<i64>,
    pub booking_users: Vec<String>,
    pub excluded_users: Vec<String>,
}

fn day_label(day: i64) -> String {
    match day {
        0 => format!("{day}（今天）"),
        1 => format!("{day}（明天）"),
        2 => format!("{day}（后天）"),
        3..=8 => format!("{day}（第{day}天）"),
        other => other.to_string(),
    }
}

fn hour_label(hour: u32) -> String {
    format!("{hour:02}:00")
}

fn slot_line(slot: &MonitorSlotLine) -> String {
    let mut meta_parts = Vec::new();
    if let Some(remain) = slot.remain {
        if remain >= 0 {
            meta_parts.push(format!("余{remain}"));
        }
    }
    if let Some(price) = slot.price {
        meta_parts.push(format!("¥{price:.0}"));
    }

    let mut parts = vec![format!("{} {}-{}", slot.date, slot.start, slot.end)];
    if let Some(field) = slot.field_name.as_deref().or(slot.area_name.as_deref()) {
        parts.push(field.to_string());
    }
    if !meta_parts.is_empty() {
        parts.push(meta_parts.join(" "));
    }
    parts.join(" | ")
}

/// Builds the order-outcome message body (success and failure share a
/// layout, differing only in title and the presence of a payment
/// reminder).
pub fn build_order_message(n: &OrderNotification) -> String {
    let title = if n.success {
        "🎉 订单预订成功！"
    } else {
        "❌ 订单预订失败"
    };

    let mut message = String::new();
    let _ = writeln!(message, "{title}\n");
    let _ = writeln!(message, "📋 订单信息：");
    if let Some(order_id) = &n.order_id {
        let _ = writeln!(message, "🆔 订单ID: {order_id}");
    }
    let _ = writeln!(message, "👤 用户: {}", n.user_nickname);
    let _ = writeln!(message, "🏟️ 场馆: {}", n.venue_name);
    let _ = writeln!(message, "🏃 项目: {}", n.field_type_name);
    let _ = writeln!(message, "📅 日期: {}", n.date);
    let _ = writeln!(message, "⏰ 时间: {} - {}\n", n.start_time, n.end_time);
    message.push_str(&n.message);
    message
}

/// Builds the slot-availability message body for a monitor tick (§4.8).
pub fn build_monitor_message(n: &MonitorNotification) -> String {
    let mut lines = vec![format!("📡 监控任务 {} 检测到可预订场次", n.monitor_id)];

    if n.venue_name.is_some() || n.field_type_name.is_some() {
        let venue_line: Vec<&str> = [n.venue_name.as_deref(), n.field_type_name.as_deref()]
            .into_iter()
            .flatten()
            .collect();
        if !venue_line.is_empty() {
            lines.push(format!("🏟️ {}", venue_line.join(" / ")));
        }
    }
    lines.push(format!("🤖 自动预订：{}", if n.auto_book { "开启" } else { "关闭" }));

    if !n.preferred_hours.is_empty() {
        let hours = n.preferred_hours.iter().map(|h| hour_label(*h)).collect::<Vec<_>>().join(", ");
        lines.push(format!("⏱️ 优先时段：{hours}"));
    }
    if !n.preferred_days.is_empty() {
        let days = n.preferred_days.iter().map(|d| day_label(*d)).collect::<Vec<_>>().join(", ");
        lines.push(format!("📅 优先天数：{days}"));
    }
    if !n.booking_users.is_empty() {
        lines.push(format!("👥 指定账号：{}", n.booking_users.join(", ")));
    }
    if !n.excluded_users.is_empty() {
        lines.push(format!("🚫 排除账号：{}", n.excluded_users.join(", ")));
    }

    lines.push(String::new());
    lines.push("可用时间段：".to_string());
    for slot in &n.slots {
        lines.push(format!("• {}", slot_line(slot)));
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn day_label_maps_known_offsets() {
        assert_eq!(day_label(0), "0（今天）");
        assert_eq!(day_label(1), "1（明天）");
        assert_eq!(day_label(2), "2（后天）");
        assert_eq!(day_label(5), "5（第5天）");
    }

    #[test]
    fn hour_label_pads_single_digit() {
        assert_eq!(hour_label(9), "09:00");
        assert_eq!(hour_label(18), "18:00");
    }

    #[test]
    fn order_message_includes_order_id_when_present() {
        let n = OrderNotification {
            order_id: Some("ORD-1".into()),
            user_nickname: "alice".into(),
            venue_name: "Main Gym".into(),
            field_type_name: "Badminton".into(),
            date: "2026-07-29".into(),
            start_time: "18:00".into(),
            end_time: "19:00".into(),
            success: true,
            message: "预订已确认".into(),
        };
        let msg = build_order_message(&n);
        assert!(msg.contains("🎉 订单预订成功！"));
        assert!(msg.contains("ORD-1"));
        assert!(msg.contains("预订已确认"));
    }

    #[test]
    fn monitor_message_lists_each_slot() {
        let n = MonitorNotification {
            monitor_id: "m1".into(),
            venue_name: Some("Main Gym".into()),
            field_type_name: Some("Badminton".into()),
            slots: vec![MonitorSlotLine {
                date: "2026-07-29".into(),
                start: "18:00".into(),
                end: "19:00".into(),
                field_name: Some("Court 3".into()),
                area_name: None,
                remain: Some(2),
                price: Some(40.0),
            }],
            auto_book: true,
            preferred_hours: vec![18, 19],
            preferred_days: vec![0, 1],
            booking_users: vec!["alice".into()],
            excluded_users: Vec::new(),
        };
        let msg = build_monitor_message(&n);
        assert!(msg.contains("监控任务 m1"));
        assert!(msg.contains("自动预订：开启"));
        assert!(msg.contains("2026-07-29 18:00-19:00 | Court 3 | 余2 ¥40"));
    }
}
