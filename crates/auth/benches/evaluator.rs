use criterion::{Criterion, black_box, criterion_group, criterion_main};

use edugate_auth::{
    Action, Feature, Permission, PermissionCheck, PermissionTree, Resource, Role,
    RoleBooleanAlgebra, RoleLevel, RoleType, UserRole,
};
use edugate_core::UserId;

fn teacher() -> RoleBooleanAlgebra {
    let permissions: PermissionTree = Resource::ALL
        .iter()
        .flat_map(|r| [Action::View, Action::Create, Action::Edit].map(|a| Permission::new(*r, a)))
        .collect();

    RoleBooleanAlgebra::for_role(UserRole {
        user_id: UserId::new(),
        role: Role::Teacher,
        level: RoleLevel(6),
        is_active: true,
        is_suspended: false,
        permissions,
    })
}

fn bench_evaluator(c: &mut Criterion) {
    let algebra = teacher();
    let check = PermissionCheck::new(algebra.clone());

    c.bench_function("has_exact_permission", |b| {
        b.iter(|| algebra.has_exact_permission(black_box(Permission::COURSES_EDIT)))
    });

    c.bench_function("has_permission_path", |b| {
        b.iter(|| algebra.has_permission_path(black_box("courses.edit")))
    });

    c.bench_function("can_access_feature", |b| {
        b.iter(|| {
            algebra.can_access_feature(
                black_box(Feature::CourseManagement),
                Some(RoleType::Teacher),
                &[Permission::COURSES_CREATE, Permission::COURSES_VIEW],
            )
        })
    });

    c.bench_function("permission_summary", |b| b.iter(|| black_box(check.summary())));
}

criterion_group!(benches, bench_evaluator);
criterion_main!(benches);
