use serde_json::json;
use sqlx::PgPool;

use super::{
    ensure_owner,
    mailer::{course_published_email, Mailer},
    not_found,
    storage::FileStorage,
    ServiceError, ServiceResult,
};
use crate::{
    middleware::auth::AuthUser,
    models::course::{
        Course, CoursePreviewResponse, CourseResponse, CreateCourseRequest, CreateLessonRequest,
        Lesson, LessonPreview, LessonResponse, UpdateCourseRequest, UpdateLessonRequest,
        VideoUploadResponse,
    },
    utils::logger::LOGGER,
};

const COURSE_SELECT: &str = r#"
    SELECT c.id, c.title, c.description, c.teacher_id, u.name AS teacher_name,
           c.paid, c.price, c.published, c.created_at
    FROM courses c
    JOIN users u ON u.id = c.teacher_id
"#;

pub const VIDEO_ROUTE_PREFIX: &str = "/api/videos";

pub fn ensure_author(actor: &AuthUser) -> ServiceResult<()> {
    if actor.is_teacher() || actor.is_admin() {
        Ok(())
    } else {
        Err(ServiceError::Forbidden("Only teachers can create courses".to_string()))
    }
}

/// Free courses always carry a zero price; paid ones need a positive price.
pub fn normalize_pricing(paid: bool, price: f64) -> ServiceResult<f64> {
    if !paid {
        return Ok(0.0);
    }
    if !price.is_finite() || price <= 0.0 {
        return Err(ServiceError::InvalidState(
            "Paid courses need a price greater than zero".to_string(),
        ));
    }
    Ok(price)
}

pub struct CourseService {
    db: PgPool,
    mailer: Mailer,
    storage: FileStorage,
}

impl CourseService {
    pub fn new(db: PgPool, mailer: Mailer, storage: FileStorage) -> Self {
        Self { db, mailer, storage }
    }

    pub async fn create(&self, actor: &AuthUser, request: CreateCourseRequest) -> ServiceResult<CourseResponse> {
        ensure_author(actor)?;
        let price = normalize_pricing(request.paid, request.price)?;

        let course = sqlx::query_as::<_, Course>(
            r#"
            INSERT INTO courses (title, description, teacher_id, paid, price)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(request.title.trim())
        .bind(request.description.trim())
        .bind(actor.user_id)
        .bind(request.paid)
        .bind(price)
        .fetch_one(&self.db)
        .await?;

        LOGGER.log_business_event(
            "course_created",
            Some(actor.user_id),
            json!({"course_id": course.id, "paid": course.paid}),
        );

        self.fetch_course(course.id).await
    }

    pub async fn update(
        &self,
        actor: &AuthUser,
        course_id: i32,
        request: UpdateCourseRequest,
    ) -> ServiceResult<CourseResponse> {
        let course = self.owned_course(actor, course_id).await?;

        let paid = request.paid.unwrap_or(course.paid);
        let price = normalize_pricing(paid, request.price.unwrap_or(course.price))?;
        let title = request.title.as_deref().map(str::trim).unwrap_or(&course.title);
        let description = request
            .description
            .as_deref()
            .map(str::trim)
            .unwrap_or(&course.description);

        sqlx::query(
            r#"
            UPDATE courses SET title = $1, description = $2, paid = $3, price = $4
            WHERE id = $5
            "#,
        )
        .bind(title)
        .bind(description)
        .bind(paid)
        .bind(price)
        .bind(course_id)
        .execute(&self.db)
        .await?;

        self.fetch_course(course_id).await
    }

    pub async fn delete(&self, actor: &AuthUser, course_id: i32) -> ServiceResult<()> {
        self.owned_course(actor, course_id).await?;

        sqlx::query("DELETE FROM courses WHERE id = $1")
            .bind(course_id)
            .execute(&self.db)
            .await?;

        LOGGER.log_business_event("course_deleted", Some(actor.user_id), json!({"course_id": course_id}));
        Ok(())
    }

    /// Flips the published flag. Going live mails every active student.
    pub async fn toggle_publish(&self, actor: &AuthUser, course_id: i32) -> ServiceResult<CourseResponse> {
        self.owned_course(actor, course_id).await?;

        let published = sqlx::query_scalar::<_, bool>(
            "UPDATE courses SET published = NOT published WHERE id = $1 RETURNING published",
        )
        .bind(course_id)
        .fetch_one(&self.db)
        .await?;

        let course = self.fetch_course(course_id).await?;

        if published {
            let recipients = sqlx::query_scalar::<_, String>(
                "SELECT email FROM users WHERE role = 'STUDENT' AND enabled = TRUE",
            )
            .fetch_all(&self.db)
            .await?;

            LOGGER.log_business_event(
                "course_published",
                Some(actor.user_id),
                json!({"course_id": course_id, "recipients": recipients.len()}),
            );

            self.mailer.broadcast(
                recipients
                    .iter()
                    .map(|email| course_published_email(email, &course.title, &course.teacher_name))
                    .collect(),
            );
        }

        Ok(course)
    }

    pub async fn list_published(&self) -> ServiceResult<Vec<CourseResponse>> {
        let query = format!("{} WHERE c.published = TRUE ORDER BY c.created_at DESC", COURSE_SELECT);
        let courses = sqlx::query_as::<_, CourseResponse>(&query)
            .fetch_all(&self.db)
            .await?;

        Ok(courses)
    }

    pub async fn get_published(&self, course_id: i32) -> ServiceResult<CourseResponse> {
        let course = self.fetch_course(course_id).await?;
        if !course.published {
            return Err(ServiceError::NotFound("Course not found".to_string()));
        }
        Ok(course)
    }

    /// Teachers see their own courses, admins see every course.
    pub async fn list_mine(&self, actor: &AuthUser) -> ServiceResult<Vec<CourseResponse>> {
        let courses = if actor.is_admin() {
            let query = format!("{} ORDER BY c.created_at DESC", COURSE_SELECT);
            sqlx::query_as::<_, CourseResponse>(&query)
                .fetch_all(&self.db)
                .await?
        } else {
            let query = format!("{} WHERE c.teacher_id = $1 ORDER BY c.created_at DESC", COURSE_SELECT);
            sqlx::query_as::<_, CourseResponse>(&query)
                .bind(actor.user_id)
                .fetch_all(&self.db)
                .await?
        };

        Ok(courses)
    }

    pub async fn preview(&self, course_id: i32) -> ServiceResult<CoursePreviewResponse> {
        let course = self.get_published(course_id).await?;

        let lessons = sqlx::query_as::<_, LessonPreview>(
            r#"
            SELECT id, title, lesson_order, day_number FROM lessons
            WHERE course_id = $1
            ORDER BY lesson_order, id
            "#,
        )
        .bind(course_id)
        .fetch_all(&self.db)
        .await?;

        Ok(CoursePreviewResponse {
            id: course.id,
            title: course.title,
            description: course.description,
            paid: course.paid,
            price: course.price,
            teacher_name: course.teacher_name,
            lessons,
        })
    }

    pub async fn add_lesson(
        &self,
        actor: &AuthUser,
        course_id: i32,
        request: CreateLessonRequest,
    ) -> ServiceResult<LessonResponse> {
        self.owned_course(actor, course_id).await?;

        let lesson = sqlx::query_as::<_, Lesson>(
            r#"
            INSERT INTO lessons (course_id, title, video_url, lesson_order, day_number)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(course_id)
        .bind(request.title.trim())
        .bind(&request.video_url)
        .bind(request.lesson_order)
        .bind(request.day_number.unwrap_or(1))
        .fetch_one(&self.db)
        .await?;

        Ok(LessonResponse::from(lesson))
    }

    pub async fn update_lesson(
        &self,
        actor: &AuthUser,
        course_id: i32,
        lesson_id: i32,
        request: UpdateLessonRequest,
    ) -> ServiceResult<LessonResponse> {
        let lesson = self.owned_lesson(actor, course_id, lesson_id).await?;

        let updated = sqlx::query_as::<_, Lesson>(
            r#"
            UPDATE lessons
            SET title = $1, video_url = $2, lesson_order = $3, day_number = $4
            WHERE id = $5
            RETURNING *
            "#,
        )
        .bind(request.title.as_deref().map(str::trim).unwrap_or(&lesson.title))
        .bind(request.video_url.or(lesson.video_url))
        .bind(request.lesson_order.unwrap_or(lesson.lesson_order))
        .bind(request.day_number.unwrap_or(lesson.day_number))
        .bind(lesson_id)
        .fetch_one(&self.db)
        .await?;

        Ok(LessonResponse::from(updated))
    }

    pub async fn delete_lesson(&self, actor: &AuthUser, course_id: i32, lesson_id: i32) -> ServiceResult<()> {
        self.owned_lesson(actor, course_id, lesson_id).await?;

        sqlx::query("DELETE FROM lessons WHERE id = $1")
            .bind(lesson_id)
            .execute(&self.db)
            .await?;

        Ok(())
    }

    /// Lessons of a published course, or of an unpublished one the caller owns.
    pub async fn list_lessons(&self, actor: &AuthUser, course_id: i32) -> ServiceResult<Vec<LessonResponse>> {
        let course = self.course(course_id).await?;
        if !course.published && ensure_owner(actor, course.teacher_id, "").is_err() {
            return Err(ServiceError::NotFound("Course not found".to_string()));
        }

        let lessons = sqlx::query_as::<_, Lesson>(
            "SELECT * FROM lessons WHERE course_id = $1 ORDER BY lesson_order, id",
        )
        .bind(course_id)
        .fetch_all(&self.db)
        .await?;

        Ok(lessons.into_iter().map(LessonResponse::from).collect())
    }

    pub async fn upload_video(
        &self,
        actor: &AuthUser,
        original_name: &str,
        data: &[u8],
    ) -> ServiceResult<VideoUploadResponse> {
        let file_name = self.storage.save_video(original_name, data).await?;

        LOGGER.log_business_event(
            "video_uploaded",
            Some(actor.user_id),
            json!({"file_name": file_name, "bytes": data.len()}),
        );

        Ok(VideoUploadResponse {
            url: format!("{}/{}", VIDEO_ROUTE_PREFIX, file_name),
        })
    }

    async fn course(&self, course_id: i32) -> ServiceResult<Course> {
        let course = sqlx::query_as::<_, Course>("SELECT * FROM courses WHERE id = $1")
            .bind(course_id)
            .fetch_optional(&self.db)
            .await?;

        course.ok_or_else(not_found("Course"))
    }

    async fn owned_course(&self, actor: &AuthUser, course_id: i32) -> ServiceResult<Course> {
        let course = self.course(course_id).await?;
        ensure_owner(actor, course.teacher_id, "You do not own this course")?;
        Ok(course)
    }

    async fn owned_lesson(&self, actor: &AuthUser, course_id: i32, lesson_id: i32) -> ServiceResult<Lesson> {
        self.owned_course(actor, course_id).await?;

        let lesson = sqlx::query_as::<_, Lesson>("SELECT * FROM lessons WHERE id = $1 AND course_id = $2")
            .bind(lesson_id)
            .bind(course_id)
            .fetch_optional(&self.db)
            .await?;

        lesson.ok_or_else(not_found("Lesson"))
    }

    async fn fetch_course(&self, course_id: i32) -> ServiceResult<CourseResponse> {
        let query = format!("{} WHERE c.id = $1", COURSE_SELECT);
        let course = sqlx::query_as::<_, CourseResponse>(&query)
            .bind(course_id)
            .fetch_optional(&self.db)
            .await?;

        course.ok_or_else(not_found("Course"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{models::user::UserRole, services::test_support::actor};

    #[test]
    fn test_only_teachers_and_admins_author_courses() {
        assert!(ensure_author(&actor(1, UserRole::Teacher)).is_ok());
        assert!(ensure_author(&actor(2, UserRole::Admin)).is_ok());
        match ensure_author(&actor(3, UserRole::Student)) {
            Err(ServiceError::Forbidden(msg)) => assert_eq!(msg, "Only teachers can create courses"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_free_course_price_is_zeroed() {
        assert_eq!(normalize_pricing(false, 49.0).unwrap(), 0.0);
        assert_eq!(normalize_pricing(false, 0.0).unwrap(), 0.0);
    }

    #[test]
    fn test_paid_course_needs_positive_price() {
        assert_eq!(normalize_pricing(true, 100.0).unwrap(), 100.0);
        assert!(normalize_pricing(true, 0.0).is_err());
        assert!(normalize_pricing(true, f64::NAN).is_err());
    }
}
