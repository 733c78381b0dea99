//! Typed row shapes for the backend tables and the aggregate view shapes
//! assembled by the dashboard facade.
//!
//! Rows are owned and persisted remotely; these structs only describe what
//! comes back over the wire. Fields the backend may omit are optional, and
//! embedded resources (joined rows) deserialize from their relation keys.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// CORE ROWS
// =============================================================================

/// Row of the `patients` table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub id_number: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub current_department: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Row of the `patient_queue` table, optionally carrying the joined patient
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: String,
    pub patient_id: String,
    pub department: String,
    pub status: String,
    #[serde(default)]
    pub queue_number: Option<i64>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// Embedded resource from `select=*,patients(*)`
    #[serde(rename = "patients", default)]
    pub patient: Option<Patient>,
}

/// Row of the `appointments` table with optional patient/doctor embeds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: String,
    pub patient_id: String,
    pub doctor_id: String,
    pub appointment_date: NaiveDate,
    pub status: String,
    #[serde(rename = "patients", default)]
    pub patient: Option<Patient>,
    /// Embedded via the `doctors:user_profiles(*)` alias
    #[serde(rename = "doctors", default)]
    pub doctor: Option<UserProfile>,
}

/// User role stored on `user_profiles`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Patient,
    Doctor,
    Admin,
    #[serde(other)]
    Other,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Patient => "patient",
            Role::Doctor => "doctor",
            Role::Admin => "admin",
            Role::Other => "other",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Row of the `user_profiles` table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    #[serde(default)]
    pub id_number: Option<String>,
    pub full_name: String,
    pub role: Role,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Row of the `patient_flow_stats` table (one per date)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowStat {
    pub date: NaiveDate,
    #[serde(default)]
    pub total_patients: i64,
    #[serde(default)]
    pub total_appointments: i64,
    #[serde(default)]
    pub completed_visits: i64,
    #[serde(default)]
    pub average_wait_time: f64,
    #[serde(default)]
    pub patient_satisfaction: f64,
}

impl FlowStat {
    /// Zero-valued record substituted when no statistics row exists yet
    /// for the given date
    pub fn default_for(date: NaiveDate) -> Self {
        Self {
            date,
            total_patients: 0,
            total_appointments: 0,
            completed_visits: 0,
            average_wait_time: 0.0,
            patient_satisfaction: 0.0,
        }
    }
}

/// Row of the `department_metrics` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepartmentMetric {
    pub department: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub avg_wait_time: f64,
    #[serde(default)]
    pub patient_count: i64,
    #[serde(default)]
    pub utilization_rate: f64,
}

/// Row of the `notifications` table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Single row of the backend-maintained `real_time_dashboard` view
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RealTimeSnapshot {
    #[serde(default)]
    pub total_waiting: i64,
    #[serde(default)]
    pub total_in_treatment: i64,
    #[serde(default)]
    pub total_completed_today: i64,
    #[serde(default)]
    pub avg_wait_minutes: f64,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// Columns the view exposes beyond the ones modeled above
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

// =============================================================================
// INSERT / UPDATE SHAPES
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct NewPatient {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_department: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PatientUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_department: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewQueueEntry {
    pub patient_id: String,
    pub department: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_number: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewAppointment {
    pub patient_id: String,
    pub doctor_id: String,
    pub appointment_date: NaiveDate,
    pub status: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AppointmentUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appointment_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// Profile row created at registration time
#[derive(Debug, Clone, Serialize)]
pub struct NewUserProfile {
    pub user_id: String,
    pub id_number: String,
    pub full_name: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// AGGREGATE VIEW SHAPES
// =============================================================================

/// Counts of one doctor's appointments for a day, grouped by status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AppointmentStats {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
    pub cancelled: usize,
}

/// One point of the patient-flow chart (field projection of a FlowStat)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub date: NaiveDate,
    pub patients: i64,
    pub wait_time: f64,
    pub satisfaction: f64,
}

/// Today's per-department comparison row for charting
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepartmentComparison {
    pub department: String,
    pub avg_wait_time: f64,
    pub patient_count: i64,
    pub utilization_rate: f64,
}

/// Everything the patient view renders
#[derive(Debug, Clone, Serialize)]
pub struct PatientDashboard {
    pub profile: Patient,
    pub appointments: Vec<Appointment>,
    pub queue_status: Option<QueueEntry>,
}

/// Everything the doctor view renders
#[derive(Debug, Clone, Serialize)]
pub struct DoctorDashboard {
    pub today_appointments: Vec<Appointment>,
    pub queue: Vec<QueueEntry>,
    pub stats: AppointmentStats,
}

/// Everything the admin view renders
#[derive(Debug, Clone, Serialize)]
pub struct AdminDashboard {
    pub realtime: RealTimeSnapshot,
    pub today_stats: FlowStat,
    pub departments: Vec<DepartmentMetric>,
}

/// A patient row with their full appointment and queue history
#[derive(Debug, Clone, Serialize)]
pub struct PatientHistory {
    pub patient: Patient,
    pub appointments: Vec<Appointment>,
    pub queue_history: Vec<QueueEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_entry_with_embedded_patient() {
        let raw = r#"{
            "id": "q1",
            "patient_id": "p1",
            "department": "cardiology",
            "status": "waiting",
            "queue_number": 4,
            "patients": { "id": "p1", "name": "Ada" }
        }"#;
        let entry: QueueEntry = serde_json::from_str(raw).unwrap();
        assert_eq!(entry.queue_number, Some(4));
        assert_eq!(entry.patient.as_ref().unwrap().name, "Ada");
    }

    #[test]
    fn test_role_round_trip_and_unknown() {
        let role: Role = serde_json::from_str("\"doctor\"").unwrap();
        assert_eq!(role, Role::Doctor);
        let unknown: Role = serde_json::from_str("\"receptionist\"").unwrap();
        assert_eq!(unknown, Role::Other);
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
    }

    #[test]
    fn test_flow_stat_default_record_is_zeroed() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let stat = FlowStat::default_for(date);
        assert_eq!(stat.date, date);
        assert_eq!(stat.total_patients, 0);
        assert_eq!(stat.average_wait_time, 0.0);
        assert_eq!(stat.patient_satisfaction, 0.0);
    }

    #[test]
    fn test_patient_update_skips_unset_fields() {
        let update = PatientUpdate {
            status: Some("admitted".to_string()),
            ..Default::default()
        };
        let body = serde_json::to_value(&update).unwrap();
        assert_eq!(body, serde_json::json!({ "status": "admitted" }));
    }
}
