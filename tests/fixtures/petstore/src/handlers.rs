use crate::models::Pet as Animal;
use crate::models::{self, Page};

/// @Summary Get a pet
/// @Tags pets
/// @Param id path int true "Pet id"
/// @Success 200 {object} Animal
/// @Failure 404 "Pet not found"
/// @Router /pets/{id} [get]
pub async fn get_pet() {}

/// @Summary Add a pet
/// @Tags pets,admin
/// @Accept json
/// @Produce json
/// @Param pet body models::Pet true "Pet to add"
/// @Success 201 {object} models.Pet
/// @Router /pets [post]
pub async fn create_pet() {}

/// @Summary List pets
/// @Tags pets
/// @Param status query models::Status false "Filter by status"
/// @Param ids query []string false "Only these ids"
/// @Success 200 {object} Page<models::Pet>
/// @Router /pets [get]
pub async fn list_pets() {}

/// @Summary Purge deleted pets
/// @Tags admin,internal
/// @Success 204
/// @Router /admin/purge [delete]
pub async fn purge() {}

/// @Summary Store statistics
/// @Tags admin
/// @Security ApiKeyAuth
/// @Success 200 {object} map[string]int
/// @Router /admin/stats [get]
pub async fn stats() {}
