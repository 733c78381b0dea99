//! Aggregation facade
//!
//! Composes one dashboard view per role out of several independent store
//! reads executed concurrently. Failure rule: if any one sub-read fails,
//! the whole view fetch fails - partial views are never returned. This is
//! also where the small derived values live: appointment counts by status,
//! chart projections, and the zero-valued fallback for days without a
//! statistics row.

use chrono::{Duration, NaiveDate, Utc};
use std::sync::Arc;

use crate::database::{AppointmentFilters, DashboardStore, DateRange};
use crate::errors::FlowError;
use crate::logger::{self, LogTag};
use crate::models::{
    AdminDashboard, Appointment, AppointmentStats, ChartPoint, DepartmentComparison,
    DoctorDashboard, FlowStat, Notification, PatientDashboard, QueueEntry,
};

/// Appointment statuses the derived stats group by
const STATUS_COMPLETED: &str = "completed";
const STATUS_PENDING: &str = "pending";
const STATUS_CANCELLED: &str = "cancelled";

pub struct DashboardService<S: DashboardStore> {
    store: Arc<S>,
}

impl<S: DashboardStore> DashboardService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    fn today() -> NaiveDate {
        Utc::now().date_naive()
    }

    /// Patient view: profile, appointment list and current queue position
    pub async fn patient_dashboard(
        &self,
        patient_id: &str,
    ) -> Result<PatientDashboard, FlowError> {
        let filters = AppointmentFilters {
            patient_id: Some(patient_id.to_string()),
            ..Default::default()
        };

        let (profile, appointments, queue_status) = tokio::try_join!(
            self.store.patient_by_id(patient_id),
            self.store.appointments(&filters),
            self.store.patient_queue_status(patient_id),
        )
        .map_err(|e| {
            logger::error(
                LogTag::Dashboard,
                &format!("Patient dashboard fetch failed: {}", e),
            );
            e
        })?;

        Ok(PatientDashboard {
            profile,
            appointments,
            queue_status,
        })
    }

    /// Doctor view: today's appointments, the department queue and
    /// derived per-status counts
    pub async fn doctor_dashboard(&self, doctor_id: &str) -> Result<DoctorDashboard, FlowError> {
        let filters = AppointmentFilters {
            doctor_id: Some(doctor_id.to_string()),
            date: Some(Self::today()),
            ..Default::default()
        };

        let (today_appointments, queue) = tokio::try_join!(
            self.store.appointments(&filters),
            self.doctor_queue(doctor_id),
        )
        .map_err(|e| {
            logger::error(
                LogTag::Dashboard,
                &format!("Doctor dashboard fetch failed: {}", e),
            );
            e
        })?;

        let stats = appointment_stats(&today_appointments);

        Ok(DoctorDashboard {
            today_appointments,
            queue,
            stats,
        })
    }

    /// The live queue a doctor works from, routed via their profile's
    /// department. A missing profile or department yields an empty queue,
    /// not an error.
    pub async fn doctor_queue(&self, doctor_id: &str) -> Result<Vec<QueueEntry>, FlowError> {
        let profile = self.store.profile_by_user_id(doctor_id).await?;
        match profile.and_then(|p| p.department) {
            Some(department) if !department.trim().is_empty() => {
                self.store.queue_by_department(&department).await
            }
            _ => {
                logger::debug(
                    LogTag::Dashboard,
                    &format!("Doctor {} has no department, queue is empty", doctor_id),
                );
                Ok(Vec::new())
            }
        }
    }

    /// Admin view: realtime snapshot, today's flow stats and per-department
    /// metrics
    pub async fn admin_dashboard(&self) -> Result<AdminDashboard, FlowError> {
        let today = Self::today();

        let (realtime, today_stats, departments) = tokio::try_join!(
            self.store.realtime_snapshot(),
            self.today_statistics(today),
            self.store.department_metrics_for_date(today),
        )
        .map_err(|e| {
            logger::error(
                LogTag::Dashboard,
                &format!("Admin dashboard fetch failed: {}", e),
            );
            e
        })?;

        Ok(AdminDashboard {
            realtime,
            today_stats,
            departments,
        })
    }

    /// Today's statistics row; a missing row is expected early in the day
    /// and substitutes the zero-valued record
    async fn today_statistics(&self, today: NaiveDate) -> Result<FlowStat, FlowError> {
        match self.store.flow_stats_for_date(today).await {
            Ok(stats) => Ok(stats),
            Err(e) if e.is_not_found() => Ok(FlowStat::default_for(today)),
            Err(e) => Err(e),
        }
    }

    /// Flow statistics of the trailing window, projected for charting
    pub async fn flow_chart_data(&self, days: i64) -> Result<Vec<ChartPoint>, FlowError> {
        let start = Self::today() - Duration::days(days);
        let range = DateRange {
            start: Some(start),
            end: None,
        };
        let stats = self.store.flow_statistics(&range).await?;
        Ok(stats.iter().map(chart_point).collect())
    }

    /// Today's metrics of every department, for side-by-side charting
    pub async fn department_comparison(&self) -> Result<Vec<DepartmentComparison>, FlowError> {
        let metrics = self
            .store
            .department_metrics_for_date(Self::today())
            .await?;
        Ok(metrics
            .into_iter()
            .map(|m| DepartmentComparison {
                department: m.department,
                avg_wait_time: m.avg_wait_time,
                patient_count: m.patient_count,
                utilization_rate: m.utilization_rate,
            })
            .collect())
    }

    pub async fn notifications(&self, user_id: &str) -> Result<Vec<Notification>, FlowError> {
        self.store.unread_notifications(user_id).await
    }

    pub async fn mark_notification_read(&self, notification_id: &str) -> Result<(), FlowError> {
        self.store.mark_notification_read(notification_id).await
    }
}

// =============================================================================
// DERIVED VALUES
// =============================================================================

/// Count one day's appointments by exact status match
pub fn appointment_stats(appointments: &[Appointment]) -> AppointmentStats {
    AppointmentStats {
        total: appointments.len(),
        completed: count_status(appointments, STATUS_COMPLETED),
        pending: count_status(appointments, STATUS_PENDING),
        cancelled: count_status(appointments, STATUS_CANCELLED),
    }
}

fn count_status(appointments: &[Appointment], status: &str) -> usize {
    appointments.iter().filter(|a| a.status == status).count()
}

/// Field projection of one statistics row for the flow chart
fn chart_point(stat: &FlowStat) -> ChartPoint {
    ChartPoint {
        date: stat.date,
        patients: stat.total_patients,
        wait_time: stat.average_wait_time,
        satisfaction: stat.patient_satisfaction,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DepartmentMetric, Patient, RealTimeSnapshot, Role, UserProfile};
    use async_trait::async_trait;

    // ==================== Fixtures ====================

    fn patient() -> Patient {
        Patient {
            id: "p1".to_string(),
            name: "Ada Lovelace".to_string(),
            id_number: Some("12345".to_string()),
            status: Some("waiting".to_string()),
            current_department: Some("cardiology".to_string()),
            created_at: None,
        }
    }

    fn appointment(status: &str) -> Appointment {
        Appointment {
            id: format!("a-{}", status),
            patient_id: "p1".to_string(),
            doctor_id: "d1".to_string(),
            appointment_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            status: status.to_string(),
            patient: None,
            doctor: None,
        }
    }

    fn doctor_profile(department: Option<&str>) -> UserProfile {
        UserProfile {
            user_id: "d1".to_string(),
            id_number: Some("99".to_string()),
            full_name: "Dr. Crusher".to_string(),
            role: Role::Doctor,
            department: department.map(str::to_string),
            phone: None,
            created_at: None,
        }
    }

    fn queue_entry(id: &str) -> QueueEntry {
        QueueEntry {
            id: id.to_string(),
            patient_id: "p1".to_string(),
            department: "cardiology".to_string(),
            status: "waiting".to_string(),
            queue_number: Some(1),
            created_at: None,
            updated_at: None,
            patient: None,
        }
    }

    // ==================== Fake store ====================

    #[derive(Default)]
    struct FakeStore {
        patient: Option<Patient>,
        appointments: Vec<Appointment>,
        queue_status: Option<QueueEntry>,
        profile: Option<UserProfile>,
        queue: Vec<QueueEntry>,
        flow_stats: Vec<FlowStat>,
        today_stats: Option<FlowStat>,
        department_metrics: Vec<DepartmentMetric>,
        fail_appointments: bool,
        fail_snapshot: bool,
    }

    #[async_trait]
    impl DashboardStore for FakeStore {
        async fn patient_by_id(&self, patient_id: &str) -> Result<Patient, FlowError> {
            self.patient
                .clone()
                .ok_or_else(|| FlowError::not_found(format!("patient {}", patient_id)))
        }

        async fn appointments(
            &self,
            _filters: &AppointmentFilters,
        ) -> Result<Vec<Appointment>, FlowError> {
            if self.fail_appointments {
                return Err(FlowError::network("connection reset"));
            }
            Ok(self.appointments.clone())
        }

        async fn patient_queue_status(
            &self,
            _patient_id: &str,
        ) -> Result<Option<QueueEntry>, FlowError> {
            Ok(self.queue_status.clone())
        }

        async fn profile_by_user_id(
            &self,
            _user_id: &str,
        ) -> Result<Option<UserProfile>, FlowError> {
            Ok(self.profile.clone())
        }

        async fn queue_by_department(
            &self,
            _department: &str,
        ) -> Result<Vec<QueueEntry>, FlowError> {
            Ok(self.queue.clone())
        }

        async fn realtime_snapshot(&self) -> Result<RealTimeSnapshot, FlowError> {
            if self.fail_snapshot {
                return Err(FlowError::network("connection reset"));
            }
            Ok(RealTimeSnapshot::default())
        }

        async fn flow_statistics(&self, _range: &DateRange) -> Result<Vec<FlowStat>, FlowError> {
            Ok(self.flow_stats.clone())
        }

        async fn flow_stats_for_date(&self, date: NaiveDate) -> Result<FlowStat, FlowError> {
            self.today_stats
                .clone()
                .ok_or_else(|| FlowError::not_found(format!("flow stats for {}", date)))
        }

        async fn department_metrics_for_date(
            &self,
            _date: NaiveDate,
        ) -> Result<Vec<DepartmentMetric>, FlowError> {
            Ok(self.department_metrics.clone())
        }

        async fn unread_notifications(
            &self,
            _user_id: &str,
        ) -> Result<Vec<Notification>, FlowError> {
            Ok(Vec::new())
        }

        async fn mark_notification_read(&self, _notification_id: &str) -> Result<(), FlowError> {
            Ok(())
        }
    }

    fn service(store: FakeStore) -> DashboardService<FakeStore> {
        DashboardService::new(Arc::new(store))
    }

    // ==================== Derived values ====================

    #[test]
    fn test_appointment_stats_counts_by_status() {
        let appointments = vec![
            appointment("completed"),
            appointment("completed"),
            appointment("pending"),
            appointment("cancelled"),
            appointment("pending"),
        ];
        let stats = appointment_stats(&appointments);
        assert_eq!(
            stats,
            AppointmentStats {
                total: 5,
                completed: 2,
                pending: 2,
                cancelled: 1,
            }
        );
    }

    #[test]
    fn test_appointment_stats_ignores_unknown_statuses() {
        let appointments = vec![appointment("no_show"), appointment("completed")];
        let stats = appointment_stats(&appointments);
        assert_eq!(stats.total, 2);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.pending, 0);
        assert_eq!(stats.cancelled, 0);
    }

    #[test]
    fn test_chart_point_projection() {
        let stat = FlowStat {
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            total_patients: 10,
            total_appointments: 12,
            completed_visits: 8,
            average_wait_time: 5.0,
            patient_satisfaction: 0.9,
        };
        assert_eq!(
            chart_point(&stat),
            ChartPoint {
                date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                patients: 10,
                wait_time: 5.0,
                satisfaction: 0.9,
            }
        );
    }

    // ==================== View composition ====================

    #[tokio::test]
    async fn test_patient_dashboard_merges_reads() {
        let dashboard = service(FakeStore {
            patient: Some(patient()),
            appointments: vec![appointment("pending")],
            queue_status: Some(queue_entry("q1")),
            ..Default::default()
        });
        let view = dashboard.patient_dashboard("p1").await.unwrap();
        assert_eq!(view.profile.id, "p1");
        assert_eq!(view.appointments.len(), 1);
        assert_eq!(view.queue_status.unwrap().id, "q1");
    }

    #[tokio::test]
    async fn test_one_failing_read_fails_the_whole_view() {
        let dashboard = service(FakeStore {
            patient: Some(patient()),
            queue_status: Some(queue_entry("q1")),
            fail_appointments: true,
            ..Default::default()
        });
        let result = dashboard.patient_dashboard("p1").await;
        assert!(matches!(result, Err(FlowError::Network { .. })));
    }

    #[tokio::test]
    async fn test_doctor_dashboard_derives_stats() {
        let dashboard = service(FakeStore {
            appointments: vec![appointment("completed"), appointment("pending")],
            profile: Some(doctor_profile(Some("cardiology"))),
            queue: vec![queue_entry("q1"), queue_entry("q2")],
            ..Default::default()
        });
        let view = dashboard.doctor_dashboard("d1").await.unwrap();
        assert_eq!(view.stats.total, 2);
        assert_eq!(view.stats.completed, 1);
        assert_eq!(view.queue.len(), 2);
    }

    #[tokio::test]
    async fn test_doctor_without_department_gets_empty_queue() {
        let dashboard = service(FakeStore {
            profile: Some(doctor_profile(None)),
            queue: vec![queue_entry("q1")],
            ..Default::default()
        });
        let view = dashboard.doctor_dashboard("d1").await.unwrap();
        assert!(view.queue.is_empty());
    }

    #[tokio::test]
    async fn test_doctor_without_profile_gets_empty_queue() {
        let dashboard = service(FakeStore {
            profile: None,
            queue: vec![queue_entry("q1")],
            ..Default::default()
        });
        let queue = dashboard.doctor_queue("d1").await.unwrap();
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_admin_dashboard_defaults_missing_today_stats() {
        let dashboard = service(FakeStore::default());
        let view = dashboard.admin_dashboard().await.unwrap();
        let today = Utc::now().date_naive();
        assert_eq!(view.today_stats, FlowStat::default_for(today));
    }

    #[tokio::test]
    async fn test_admin_dashboard_propagates_other_failures() {
        let dashboard = service(FakeStore {
            fail_snapshot: true,
            ..Default::default()
        });
        let result = dashboard.admin_dashboard().await;
        assert!(matches!(result, Err(FlowError::Network { .. })));
    }

    #[tokio::test]
    async fn test_flow_chart_data_projects_rows() {
        let dashboard = service(FakeStore {
            flow_stats: vec![FlowStat {
                date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                total_patients: 10,
                total_appointments: 0,
                completed_visits: 0,
                average_wait_time: 5.0,
                patient_satisfaction: 0.9,
            }],
            ..Default::default()
        });
        let points = dashboard.flow_chart_data(7).await.unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].patients, 10);
        assert_eq!(points[0].wait_time, 5.0);
        assert_eq!(points[0].satisfaction, 0.9);
    }

    #[tokio::test]
    async fn test_department_comparison_projection() {
        let dashboard = service(FakeStore {
            department_metrics: vec![DepartmentMetric {
                department: "er".to_string(),
                date: Utc::now().date_naive(),
                avg_wait_time: 12.5,
                patient_count: 40,
                utilization_rate: 0.8,
            }],
            ..Default::default()
        });
        let rows = dashboard.department_comparison().await.unwrap();
        assert_eq!(
            rows,
            vec![DepartmentComparison {
                department: "er".to_string(),
                avg_wait_time: 12.5,
                patient_count: 40,
                utilization_rate: 0.8,
            }]
        );
    }
}
