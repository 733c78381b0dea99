//! Persistence facade
//!
//! One method per remote collection/operation pair. Every method builds a
//! query description, executes it through the shared client and returns the
//! typed rows; no business rule beyond the filters the caller asked for.
//! The realtime methods open live change feeds scoped to a table.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde_json::json;
use std::sync::Arc;

use crate::errors::FlowError;
use crate::logger::{self, LogTag};
use crate::models::{
    Appointment, AppointmentUpdate, DepartmentMetric, FlowStat, NewAppointment, NewPatient,
    NewQueueEntry, Notification, Patient, PatientHistory, PatientUpdate, QueueEntry,
    RealTimeSnapshot, UserProfile,
};
use crate::supabase::query::Query;
use crate::supabase::realtime::{ChangeHandler, RealtimeSubscription, SubscribeRequest};
use crate::supabase::SupabaseClient;

// Remote collection names
const TABLE_PATIENTS: &str = "patients";
const TABLE_QUEUE: &str = "patient_queue";
const TABLE_APPOINTMENTS: &str = "appointments";
const TABLE_PROFILES: &str = "user_profiles";
const TABLE_FLOW_STATS: &str = "patient_flow_stats";
const TABLE_DEPARTMENT_METRICS: &str = "department_metrics";
const TABLE_REALTIME_DASHBOARD: &str = "real_time_dashboard";
const TABLE_NOTIFICATIONS: &str = "notifications";

/// Queue entries in this status make up the active queue views
const QUEUE_STATUS_WAITING: &str = "waiting";

const SEARCH_RESULT_LIMIT: usize = 20;
const NOTIFICATION_LIMIT: usize = 10;

// =============================================================================
// FILTER SHAPES
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct PatientFilters {
    pub status: Option<String>,
    pub department: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct AppointmentFilters {
    pub patient_id: Option<String>,
    pub doctor_id: Option<String>,
    pub date: Option<NaiveDate>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

// =============================================================================
// FACADE
// =============================================================================

pub struct DatabaseService {
    client: Arc<SupabaseClient>,
}

impl DatabaseService {
    pub fn new(client: Arc<SupabaseClient>) -> Self {
        Self { client }
    }

    // ==================== Patient operations ====================

    /// All patients, newest first, optionally filtered by status/department
    pub async fn get_all_patients(
        &self,
        filters: &PatientFilters,
    ) -> Result<Vec<Patient>, FlowError> {
        let mut query = Query::table(TABLE_PATIENTS).order("created_at", false);
        if let Some(status) = &filters.status {
            query = query.eq("status", status);
        }
        if let Some(department) = &filters.department {
            query = query.eq("current_department", department);
        }
        self.client.select(&query).await
    }

    pub async fn get_patient_by_id(&self, patient_id: &str) -> Result<Patient, FlowError> {
        let query = Query::table(TABLE_PATIENTS).eq("id", patient_id);
        self.client.select_single(&query).await
    }

    pub async fn create_patient(&self, patient: &NewPatient) -> Result<Patient, FlowError> {
        logger::debug(LogTag::Db, &format!("Creating patient '{}'", patient.name));
        self.client.insert(TABLE_PATIENTS, patient).await
    }

    pub async fn update_patient(
        &self,
        patient_id: &str,
        updates: &PatientUpdate,
    ) -> Result<Patient, FlowError> {
        let query = Query::table(TABLE_PATIENTS).eq("id", patient_id);
        let rows: Vec<Patient> = self.client.update(&query, updates).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| FlowError::not_found(format!("patient {}", patient_id)))
    }

    /// Substring search across name, ID number and row id
    pub async fn search_patients(&self, term: &str) -> Result<Vec<Patient>, FlowError> {
        let query = Query::table(TABLE_PATIENTS)
            .or_ilike(&["name", "id_number", "id"], term)
            .order("created_at", false)
            .limit(SEARCH_RESULT_LIMIT);
        self.client.select(&query).await
    }

    /// Patient row plus their complete appointment and queue history
    pub async fn get_patient_full_history(
        &self,
        patient_id: &str,
    ) -> Result<PatientHistory, FlowError> {
        let patient = self.get_patient_by_id(patient_id).await?;

        let appointments_query = Query::table(TABLE_APPOINTMENTS)
            .eq("patient_id", patient_id)
            .order("appointment_date", false);
        let queue_query = Query::table(TABLE_QUEUE)
            .eq("patient_id", patient_id)
            .order("created_at", false);

        let (appointments, queue_history) = tokio::try_join!(
            self.client.select::<Appointment>(&appointments_query),
            self.client.select::<QueueEntry>(&queue_query),
        )?;

        Ok(PatientHistory {
            patient,
            appointments,
            queue_history,
        })
    }

    // ==================== Queue operations ====================

    /// Waiting queue of one department, joined to patient rows,
    /// ordered by queue number
    pub async fn get_queue_by_department(
        &self,
        department: &str,
    ) -> Result<Vec<QueueEntry>, FlowError> {
        let query = Query::table(TABLE_QUEUE)
            .select("*,patients(*)")
            .eq("department", department)
            .eq("status", QUEUE_STATUS_WAITING)
            .order("queue_number", true);
        self.client.select(&query).await
    }

    pub async fn add_to_queue(&self, entry: &NewQueueEntry) -> Result<QueueEntry, FlowError> {
        logger::debug(
            LogTag::Db,
            &format!(
                "Queueing patient {} for {}",
                entry.patient_id, entry.department
            ),
        );
        self.client.insert(TABLE_QUEUE, entry).await
    }

    pub async fn update_queue_status(
        &self,
        queue_id: &str,
        status: &str,
    ) -> Result<QueueEntry, FlowError> {
        let query = Query::table(TABLE_QUEUE).eq("id", queue_id);
        let changes = json!({ "status": status, "updated_at": Utc::now() });
        let rows: Vec<QueueEntry> = self.client.update(&query, &changes).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| FlowError::not_found(format!("queue entry {}", queue_id)))
    }

    /// Latest waiting queue entry for one patient, if any
    pub async fn get_patient_queue_status(
        &self,
        patient_id: &str,
    ) -> Result<Option<QueueEntry>, FlowError> {
        let query = Query::table(TABLE_QUEUE)
            .eq("patient_id", patient_id)
            .eq("status", QUEUE_STATUS_WAITING)
            .order("created_at", false)
            .limit(1);
        let mut rows: Vec<QueueEntry> = self.client.select(&query).await?;
        let first = rows.drain(..).next();
        Ok(first)
    }

    // ==================== Analytics operations ====================

    pub async fn get_flow_statistics(&self, range: &DateRange) -> Result<Vec<FlowStat>, FlowError> {
        let mut query = Query::table(TABLE_FLOW_STATS).order("date", false);
        if let Some(start) = range.start {
            query = query.gte("date", start);
        }
        if let Some(end) = range.end {
            query = query.lte("date", end);
        }
        self.client.select(&query).await
    }

    /// Statistics row for one exact date; `NotFound` when none exists yet
    pub async fn get_flow_stats_for_date(&self, date: NaiveDate) -> Result<FlowStat, FlowError> {
        let query = Query::table(TABLE_FLOW_STATS).eq("date", date);
        self.client.select_single(&query).await
    }

    pub async fn get_department_metrics(
        &self,
        department: &str,
        range: &DateRange,
    ) -> Result<Vec<DepartmentMetric>, FlowError> {
        let mut query = Query::table(TABLE_DEPARTMENT_METRICS)
            .eq("department", department)
            .order("date", false);
        if let Some(start) = range.start {
            query = query.gte("date", start);
        }
        if let Some(end) = range.end {
            query = query.lte("date", end);
        }
        self.client.select(&query).await
    }

    pub async fn get_department_metrics_for_date(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<DepartmentMetric>, FlowError> {
        let query = Query::table(TABLE_DEPARTMENT_METRICS).eq("date", date);
        self.client.select(&query).await
    }

    pub async fn get_realtime_snapshot(&self) -> Result<RealTimeSnapshot, FlowError> {
        let query = Query::table(TABLE_REALTIME_DASHBOARD);
        self.client.select_single(&query).await
    }

    // ==================== Appointment operations ====================

    /// Appointments with patient and doctor rows embedded, ordered by date
    pub async fn get_appointments(
        &self,
        filters: &AppointmentFilters,
    ) -> Result<Vec<Appointment>, FlowError> {
        let mut query = Query::table(TABLE_APPOINTMENTS)
            .select("*,patients(*),doctors:user_profiles(*)")
            .order("appointment_date", true);
        if let Some(patient_id) = &filters.patient_id {
            query = query.eq("patient_id", patient_id);
        }
        if let Some(doctor_id) = &filters.doctor_id {
            query = query.eq("doctor_id", doctor_id);
        }
        if let Some(date) = filters.date {
            query = query.eq("appointment_date", date);
        }
        if let Some(status) = &filters.status {
            query = query.eq("status", status);
        }
        self.client.select(&query).await
    }

    pub async fn create_appointment(
        &self,
        appointment: &NewAppointment,
    ) -> Result<Appointment, FlowError> {
        logger::debug(
            LogTag::Db,
            &format!(
                "Creating appointment for patient {} with doctor {}",
                appointment.patient_id, appointment.doctor_id
            ),
        );
        self.client.insert(TABLE_APPOINTMENTS, appointment).await
    }

    pub async fn update_appointment(
        &self,
        appointment_id: &str,
        updates: &AppointmentUpdate,
    ) -> Result<Appointment, FlowError> {
        let query = Query::table(TABLE_APPOINTMENTS).eq("id", appointment_id);
        let rows: Vec<Appointment> = self.client.update(&query, updates).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| FlowError::not_found(format!("appointment {}", appointment_id)))
    }

    // ==================== Profiles ====================

    pub async fn get_profile_by_user_id(&self, user_id: &str) -> Result<UserProfile, FlowError> {
        let query = Query::table(TABLE_PROFILES).eq("user_id", user_id);
        self.client.select_single(&query).await
    }

    // ==================== Notifications ====================

    /// Unread notifications for one user, newest first
    pub async fn get_notifications(&self, user_id: &str) -> Result<Vec<Notification>, FlowError> {
        let query = Query::table(TABLE_NOTIFICATIONS)
            .eq("user_id", user_id)
            .eq("is_read", "false")
            .order("created_at", false)
            .limit(NOTIFICATION_LIMIT);
        self.client.select(&query).await
    }

    pub async fn mark_notification_read(&self, notification_id: &str) -> Result<(), FlowError> {
        let query = Query::table(TABLE_NOTIFICATIONS).eq("id", notification_id);
        let _: Vec<Notification> = self
            .client
            .update(&query, &json!({ "is_read": true }))
            .await?;
        Ok(())
    }

    // ==================== Realtime subscriptions ====================

    /// Live change feed for one department's queue
    pub async fn subscribe_queue(
        &self,
        department: &str,
        handler: ChangeHandler,
    ) -> Result<RealtimeSubscription, FlowError> {
        let request = SubscribeRequest::all_events(
            format!("realtime:queue_{}", department),
            TABLE_QUEUE,
        )
        .with_filter(format!("department=eq.{}", department));
        self.client.subscribe(request, handler).await
    }

    /// Live feed of patient status updates across all departments
    pub async fn subscribe_patient_status(
        &self,
        handler: ChangeHandler,
    ) -> Result<RealtimeSubscription, FlowError> {
        let request = SubscribeRequest::updates_only("realtime:patient_status", TABLE_PATIENTS);
        self.client.subscribe(request, handler).await
    }

    /// Release a previously opened feed
    pub async fn unsubscribe(&self, subscription: RealtimeSubscription) {
        subscription.unsubscribe().await;
    }
}

// =============================================================================
// DASHBOARD STORE SEAM
// =============================================================================

/// The subset of the persistence facade the aggregation facade consumes.
/// Splitting it out lets dashboard composition be driven by a fake store
/// in tests.
#[async_trait]
pub trait DashboardStore: Send + Sync {
    async fn patient_by_id(&self, patient_id: &str) -> Result<Patient, FlowError>;

    async fn appointments(
        &self,
        filters: &AppointmentFilters,
    ) -> Result<Vec<Appointment>, FlowError>;

    async fn patient_queue_status(
        &self,
        patient_id: &str,
    ) -> Result<Option<QueueEntry>, FlowError>;

    /// `None` when the user has no profile row
    async fn profile_by_user_id(&self, user_id: &str) -> Result<Option<UserProfile>, FlowError>;

    async fn queue_by_department(&self, department: &str) -> Result<Vec<QueueEntry>, FlowError>;

    async fn realtime_snapshot(&self) -> Result<RealTimeSnapshot, FlowError>;

    async fn flow_statistics(&self, range: &DateRange) -> Result<Vec<FlowStat>, FlowError>;

    /// `NotFound` when no row exists for the date
    async fn flow_stats_for_date(&self, date: NaiveDate) -> Result<FlowStat, FlowError>;

    async fn department_metrics_for_date(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<DepartmentMetric>, FlowError>;

    async fn unread_notifications(&self, user_id: &str) -> Result<Vec<Notification>, FlowError>;

    async fn mark_notification_read(&self, notification_id: &str) -> Result<(), FlowError>;
}

#[async_trait]
impl DashboardStore for DatabaseService {
    async fn patient_by_id(&self, patient_id: &str) -> Result<Patient, FlowError> {
        self.get_patient_by_id(patient_id).await
    }

    async fn appointments(
        &self,
        filters: &AppointmentFilters,
    ) -> Result<Vec<Appointment>, FlowError> {
        self.get_appointments(filters).await
    }

    async fn patient_queue_status(
        &self,
        patient_id: &str,
    ) -> Result<Option<QueueEntry>, FlowError> {
        self.get_patient_queue_status(patient_id).await
    }

    async fn profile_by_user_id(&self, user_id: &str) -> Result<Option<UserProfile>, FlowError> {
        match self.get_profile_by_user_id(user_id).await {
            Ok(profile) => Ok(Some(profile)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn queue_by_department(&self, department: &str) -> Result<Vec<QueueEntry>, FlowError> {
        self.get_queue_by_department(department).await
    }

    async fn realtime_snapshot(&self) -> Result<RealTimeSnapshot, FlowError> {
        self.get_realtime_snapshot().await
    }

    async fn flow_statistics(&self, range: &DateRange) -> Result<Vec<FlowStat>, FlowError> {
        self.get_flow_statistics(range).await
    }

    async fn flow_stats_for_date(&self, date: NaiveDate) -> Result<FlowStat, FlowError> {
        self.get_flow_stats_for_date(date).await
    }

    async fn department_metrics_for_date(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<DepartmentMetric>, FlowError> {
        self.get_department_metrics_for_date(date).await
    }

    async fn unread_notifications(&self, user_id: &str) -> Result<Vec<Notification>, FlowError> {
        self.get_notifications(user_id).await
    }

    async fn mark_notification_read(&self, notification_id: &str) -> Result<(), FlowError> {
        DatabaseService::mark_notification_read(self, notification_id).await
    }
}
